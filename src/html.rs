use crate::classify::Tier;
use crate::view::{Accent, Cell, DashboardView, MetricCard, MetricsView, RecentTable};
use std::fmt::Write;

const STYLE: &str = r#"
body { margin: 0; font-family: system-ui, sans-serif; background: #f8fafc; color: #0f172a; }
.page { max-width: 72rem; margin: 0 auto; padding: 2rem; }
.center { min-height: 100vh; display: flex; align-items: center; justify-content: center; }
.card { background: #fff; border: 1px solid #e2e8f0; border-radius: .5rem; overflow: hidden; }
.placeholder { width: 24rem; padding: 1.5rem; display: flex; align-items: center; gap: .5rem; }
.dot { width: .5rem; height: .5rem; border-radius: 9999px; display: inline-block; }
.dot.yellow { background: #eab308; } .dot.green { background: #22c55e; } .dot.red { background: #ef4444; }
.header { display: flex; justify-content: space-between; align-items: center; }
.header h1 { font-size: 2.25rem; margin: 0; } .muted { color: #475569; }
.grid { display: grid; grid-template-columns: repeat(auto-fit, minmax(14rem, 1fr)); gap: 1rem; margin: 1.5rem 0; }
.metric .body { padding: 1rem; } .metric .title { font-size: .875rem; color: #475569; }
.metric .value { font-size: 1.875rem; font-weight: 700; margin-top: .5rem; }
.metric .detail { font-size: .75rem; color: #64748b; margin: .25rem 0 0; }
.bar { height: .5rem; background: #e2e8f0; overflow: hidden; } .bar > div { height: 100%; }
.accent-blue { background: #3b82f6; } .accent-purple { background: #a855f7; }
.accent-orange { background: #f97316; } .accent-pink { background: #ec4899; }
.tier-unknown { color: #64748b; } .tier-nominal { color: #16a34a; }
.tier-warning { color: #ca8a04; } .tier-critical { color: #dc2626; }
.updated { text-align: center; font-size: .875rem; color: #64748b; }
table { width: 100%; border-collapse: collapse; font-size: .875rem; }
th, td { text-align: left; padding: .5rem 1rem; border-bottom: 1px solid #e2e8f0; }
th { color: #475569; font-weight: 500; } .recent { margin-top: 1.5rem; padding: 1rem; }
"#;

pub fn render_page(view: &DashboardView, refresh_secs: u64) -> String {
    let body = match view {
        DashboardView::Connecting => placeholder("yellow", "Connecting to MQTT broker..."),
        DashboardView::WaitingForData => placeholder("green", "Waiting for metrics..."),
        DashboardView::Metrics(metrics) => metrics_page(metrics),
    };

    format!(
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n\
         <meta http-equiv=\"refresh\" content=\"{refresh_secs}\">\n\
         <title>System Monitor</title>\n<style>{STYLE}</style>\n</head>\n<body>\n{body}</body>\n</html>\n"
    )
}

fn placeholder(dot: &str, text: &str) -> String {
    format!(
        "<div class=\"center\"><div class=\"card placeholder\">\
         <span class=\"dot {dot}\"></span><span>{text}</span></div></div>\n"
    )
}

fn metrics_page(view: &MetricsView) -> String {
    let (dot, status) = if view.connected {
        ("green", "Connected")
    } else {
        ("red", "Disconnected")
    };

    let mut out = String::new();
    out.push_str("<div class=\"page\">\n");
    let _ = writeln!(
        out,
        "<div class=\"header\"><div><h1>System Monitor</h1><p class=\"muted\">{}</p></div>\
         <div class=\"muted\"><span class=\"dot {dot}\"></span> {status}</div></div>",
        escape(&view.platform)
    );

    out.push_str("<div class=\"grid\">\n");
    for card in &view.cards {
        out.push_str(&metric_card(card));
    }
    out.push_str("</div>\n");

    let _ = writeln!(
        out,
        "<div class=\"updated\">Last updated: {}</div>",
        escape(&view.last_updated)
    );

    if let Some(table) = view.recent.as_ref() {
        out.push_str(&recent_table(table));
    }
    out.push_str("</div>\n");
    out
}

pub fn metric_card(card: &MetricCard) -> String {
    let mut out = String::new();
    let _ = write!(
        out,
        "<div class=\"card metric\"><div class=\"body\"><div class=\"title\">{}</div>\
         <div class=\"value {}\">{}</div>",
        card.title,
        tier_class(card.tier),
        card.value_label()
    );
    if let Some(details) = card.details.as_ref() {
        let _ = write!(out, "<p class=\"detail\">{}</p>", escape(details));
    }
    if let Some(temperature) = card.temperature_label() {
        let _ = write!(out, "<p class=\"detail\">{temperature}</p>");
    }
    let _ = writeln!(
        out,
        "</div><div class=\"bar\"><div class=\"{}\" style=\"width: {}%\"></div></div></div>",
        accent_class(card.accent),
        card.bar_percent()
    );
    out
}

fn recent_table(table: &RecentTable) -> String {
    let mut out = String::new();
    out.push_str("<div class=\"card recent\"><h2>Recent Metrics</h2><table>\n<thead><tr>");
    out.push_str("<th>Time</th><th>CPU %</th><th>RAM %</th><th>Disk %</th>");
    if table.show_gpu {
        out.push_str("<th>GPU %</th>");
    }
    out.push_str("</tr></thead>\n<tbody>\n");

    for row in &table.rows {
        let _ = write!(
            out,
            "<tr><td>{}</td>{}{}{}",
            escape(&row.time),
            cell(&row.cpu),
            cell(&row.ram),
            cell(&row.disk)
        );
        if table.show_gpu {
            match row.gpu.as_ref() {
                Some(gpu) => out.push_str(&cell(gpu)),
                None => out.push_str("<td class=\"tier-unknown\">N/A</td>"),
            }
        }
        out.push_str("</tr>\n");
    }
    out.push_str("</tbody></table></div>\n");
    out
}

fn cell(cell: &Cell) -> String {
    format!(
        "<td><span class=\"{}\">{}%</span></td>",
        tier_class(cell.tier),
        cell.value
    )
}

fn tier_class(tier: Tier) -> &'static str {
    match tier {
        Tier::Unknown => "tier-unknown",
        Tier::Nominal => "tier-nominal",
        Tier::Warning => "tier-warning",
        Tier::Critical => "tier-critical",
    }
}

fn accent_class(accent: Accent) -> &'static str {
    match accent {
        Accent::Blue => "accent-blue",
        Accent::Purple => "accent-purple",
        Accent::Orange => "accent-orange",
        Accent::Pink => "accent-pink",
    }
}

pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}
