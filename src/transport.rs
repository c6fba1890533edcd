use rumqttc::{AsyncClient, ConnectionError, Event, EventLoop, MqttOptions, Packet, QoS};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

const REQUEST_CHANNEL_CAPACITY: usize = 16;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EndpointError {
    #[error("broker url '{0}' has no scheme (expected mqtt://, tcp:// or ws://)")]
    MissingScheme(String),
    #[error("unsupported broker url scheme '{0}'")]
    UnsupportedScheme(String),
    #[error("broker url '{0}' has no host")]
    MissingHost(String),
    #[error("invalid port in broker url '{0}'")]
    InvalidPort(String),
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("mqtt client request failed: {0}")]
    Client(#[from] rumqttc::ClientError),
    #[error("connection already ended")]
    Ended,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scheme {
    Tcp,
    Ws,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerEndpoint {
    pub scheme: Scheme,
    pub host: String,
    pub port: u16,
    pub path: String,
}

impl BrokerEndpoint {
    pub fn ws_url(&self) -> String {
        format!("ws://{}:{}{}", self.url_host(), self.port, self.path)
    }

    // IPv6 literals are stored bare and bracketed again inside urls.
    fn url_host(&self) -> String {
        if self.host.contains(':') {
            format!("[{}]", self.host)
        } else {
            self.host.clone()
        }
    }
}

impl fmt::Display for BrokerEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.scheme {
            Scheme::Tcp => write!(f, "mqtt://{}:{}", self.url_host(), self.port),
            Scheme::Ws => f.write_str(&self.ws_url()),
        }
    }
}

impl FromStr for BrokerEndpoint {
    type Err = EndpointError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = s.trim();
        let (scheme, rest) = raw
            .split_once("://")
            .ok_or_else(|| EndpointError::MissingScheme(raw.to_string()))?;
        let (scheme, default_port) = match scheme.to_ascii_lowercase().as_str() {
            "mqtt" | "tcp" => (Scheme::Tcp, 1883),
            "ws" => (Scheme::Ws, 80),
            other => return Err(EndpointError::UnsupportedScheme(other.to_string())),
        };

        let (authority, path) = match rest.find('/') {
            Some(idx) => (&rest[..idx], &rest[idx..]),
            None => (rest, ""),
        };
        let (host, port) = match authority.strip_prefix('[') {
            Some(bracketed) => {
                let (host, after) = bracketed
                    .split_once(']')
                    .ok_or_else(|| EndpointError::MissingHost(raw.to_string()))?;
                let port = if after.is_empty() {
                    default_port
                } else {
                    let port = after
                        .strip_prefix(':')
                        .ok_or_else(|| EndpointError::InvalidPort(raw.to_string()))?;
                    parse_port(port, raw)?
                };
                (host, port)
            }
            None => match authority.rsplit_once(':') {
                Some((host, port)) => (host, parse_port(port, raw)?),
                None => (authority, default_port),
            },
        };
        if host.is_empty() {
            return Err(EndpointError::MissingHost(raw.to_string()));
        }

        let path = match scheme {
            Scheme::Tcp => String::new(),
            Scheme::Ws if path.is_empty() => "/".to_string(),
            Scheme::Ws => path.to_string(),
        };

        Ok(Self {
            scheme,
            host: host.to_string(),
            port,
            path,
        })
    }
}

fn parse_port(port: &str, raw: &str) -> Result<u16, EndpointError> {
    port.parse::<u16>()
        .ok()
        .filter(|p| *p > 0)
        .ok_or_else(|| EndpointError::InvalidPort(raw.to_string()))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    Connected,
    Message { topic: String, payload: Vec<u8> },
    Error(String),
    Closed,
}

#[derive(Debug)]
pub struct SessionEvent {
    pub session: u64,
    pub event: TransportEvent,
}

#[derive(Debug, Clone)]
pub struct EventSink {
    session: u64,
    tx: mpsc::UnboundedSender<SessionEvent>,
}

impl EventSink {
    pub fn new(session: u64, tx: mpsc::UnboundedSender<SessionEvent>) -> Self {
        Self { session, tx }
    }

    pub fn session(&self) -> u64 {
        self.session
    }

    pub fn emit(&self, event: TransportEvent) -> bool {
        self.tx
            .send(SessionEvent {
                session: self.session,
                event,
            })
            .is_ok()
    }
}

#[derive(Debug, Clone)]
pub struct ConnectOptions {
    pub client_id: String,
    pub keep_alive: Duration,
    pub reconnect_delay: Duration,
}

pub trait Transport {
    type Connection: Connection;

    fn connect(
        &self,
        endpoint: &BrokerEndpoint,
        options: &ConnectOptions,
        sink: EventSink,
    ) -> Result<Self::Connection, TransportError>;
}

pub trait Connection {
    fn subscribe(&self, topic: &str) -> Result<(), TransportError>;

    // Idempotent.
    fn end(&mut self);
}

#[derive(Debug, Clone, Default)]
pub struct MqttTransport;

pub struct MqttConnection {
    client: AsyncClient,
    driver: Option<JoinHandle<()>>,
}

impl Transport for MqttTransport {
    type Connection = MqttConnection;

    fn connect(
        &self,
        endpoint: &BrokerEndpoint,
        options: &ConnectOptions,
        sink: EventSink,
    ) -> Result<Self::Connection, TransportError> {
        let mut mqtt_options = match endpoint.scheme {
            Scheme::Tcp => MqttOptions::new(&options.client_id, &endpoint.host, endpoint.port),
            Scheme::Ws => {
                let mut opts =
                    MqttOptions::new(&options.client_id, endpoint.ws_url(), endpoint.port);
                opts.set_transport(rumqttc::Transport::Ws);
                opts
            }
        };
        mqtt_options.set_keep_alive(options.keep_alive);
        mqtt_options.set_clean_session(true);

        let (client, eventloop) = AsyncClient::new(mqtt_options, REQUEST_CHANNEL_CAPACITY);
        let driver = tokio::spawn(drive(eventloop, sink, options.reconnect_delay));

        Ok(MqttConnection {
            client,
            driver: Some(driver),
        })
    }
}

impl Connection for MqttConnection {
    fn subscribe(&self, topic: &str) -> Result<(), TransportError> {
        if self.driver.is_none() {
            return Err(TransportError::Ended);
        }
        self.client.try_subscribe(topic, QoS::AtMostOnce)?;
        Ok(())
    }

    fn end(&mut self) {
        if let Some(driver) = self.driver.take() {
            if let Err(err) = self.client.try_disconnect() {
                debug!(error = %err, "disconnect request not queued");
            }
            driver.abort();
        }
    }
}

impl Drop for MqttConnection {
    fn drop(&mut self) {
        self.end();
    }
}

fn map_event(polled: Result<Event, ConnectionError>) -> Vec<TransportEvent> {
    match polled {
        Ok(Event::Incoming(Packet::ConnAck(_))) => vec![TransportEvent::Connected],
        Ok(Event::Incoming(Packet::Publish(publish))) => vec![TransportEvent::Message {
            topic: publish.topic,
            payload: publish.payload.to_vec(),
        }],
        Ok(Event::Incoming(Packet::Disconnect)) => vec![TransportEvent::Closed],
        Ok(_) => Vec::new(),
        Err(err) => vec![TransportEvent::Error(err.to_string()), TransportEvent::Closed],
    }
}

// Polling the event loop again after an error makes rumqttc reconnect.
async fn drive(mut eventloop: EventLoop, sink: EventSink, reconnect_delay: Duration) {
    loop {
        let polled = eventloop.poll().await;
        let failed = polled.is_err();
        let delivered = map_event(polled).into_iter().all(|event| sink.emit(event));
        if !delivered {
            debug!(session = sink.session(), "event queue closed, stopping mqtt driver");
            break;
        }
        if failed {
            tokio::time::sleep(reconnect_delay).await;
        }
    }
}
