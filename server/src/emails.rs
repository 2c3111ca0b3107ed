//! Subjects and HTML bodies for the operations inbox.
//!
//! Every piece of submitted text is HTML-escaped before it is interpolated.
//! Subjects are plain text and use the raw values.

use std::fmt::Write as _;

use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};

pub const ORDERS_FROM: &str = "Floortype Orders <orders@floortype.com>";
pub const QUOTES_FROM: &str = "Floortype Quotes <quotes@floortype.com>";
pub const STUDIO_FROM: &str = "Floortype <s.sterling@floortype.com>";

const DASH: &str = "\u{2014}";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Rendered {
    pub subject: String,
    pub html: String,
}

/// Checkout summary posted by the order form.
///
/// Form fields arrive with whatever JSON type the browser produced, so text
/// fields accept any scalar and structured fields stay as raw values.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct OrderNotice {
    #[serde(rename = "ref", deserialize_with = "loose_text")]
    pub reference: Option<String>,
    #[serde(deserialize_with = "loose_text")]
    pub name: Option<String>,
    #[serde(deserialize_with = "loose_text")]
    pub email: Option<String>,
    #[serde(deserialize_with = "loose_text")]
    pub company: Option<String>,
    #[serde(deserialize_with = "loose_text")]
    pub address: Option<String>,
    pub floors: Option<Value>,
    #[serde(deserialize_with = "loose_text")]
    pub style: Option<String>,
    pub addons: Option<Value>,
    pub total: Option<Value>,
    pub deposit: Option<Value>,
    #[serde(deserialize_with = "loose_text")]
    pub notes: Option<String>,
    #[serde(deserialize_with = "loose_text")]
    pub payment_method: Option<String>,
    pub net30: Option<Value>,
}

impl OrderNotice {
    pub fn is_net30(&self) -> bool {
        self.payment_method.as_deref() == Some("net30")
    }
}

/// Quote request summary posted by the quote wizard.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct QuoteNotice {
    #[serde(rename = "ref", deserialize_with = "loose_text")]
    pub reference: Option<String>,
    #[serde(deserialize_with = "loose_text")]
    pub name: Option<String>,
    #[serde(deserialize_with = "loose_text")]
    pub email: Option<String>,
    #[serde(deserialize_with = "loose_text")]
    pub company: Option<String>,
    #[serde(deserialize_with = "loose_text")]
    pub role: Option<String>,
    #[serde(deserialize_with = "loose_text")]
    pub project_name: Option<String>,
    #[serde(deserialize_with = "loose_text")]
    pub project_type: Option<String>,
    #[serde(deserialize_with = "loose_text")]
    pub city: Option<String>,
    pub phases: Option<Value>,
    pub renders: Option<Value>,
    #[serde(deserialize_with = "loose_text")]
    pub complexity: Option<String>,
    #[serde(deserialize_with = "loose_text")]
    pub timeline: Option<String>,
    pub estimate_low: Option<Value>,
    pub estimate_high: Option<Value>,
    pub total_files: Option<Value>,
    #[serde(deserialize_with = "loose_text")]
    pub shared_link: Option<String>,
    #[serde(deserialize_with = "loose_text")]
    pub notes: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct ContactMessage {
    #[serde(deserialize_with = "loose_text")]
    pub first: Option<String>,
    #[serde(deserialize_with = "loose_text")]
    pub last: Option<String>,
    #[serde(deserialize_with = "loose_text")]
    pub email: Option<String>,
    #[serde(deserialize_with = "loose_text")]
    pub company: Option<String>,
    #[serde(deserialize_with = "loose_text")]
    pub subject: Option<String>,
    #[serde(deserialize_with = "loose_text")]
    pub message: Option<String>,
}

/// Any JSON value as display text; `null` counts as absent.
fn loose_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Null => None,
        Value::String(raw) => Some(raw),
        other => Some(other.to_string()),
    })
}

/// Facts about a confirmed client review.
pub struct ReviewSummary<'a> {
    pub order_ref: &'a str,
    pub project_name: Option<&'a str>,
    pub reviewer: &'a str,
    pub stage_label: &'a str,
    pub next_stage: &'a str,
}

pub fn order_notification(notice: &OrderNotice, dashboard_url: &str) -> Rendered {
    let reference = notice.reference.as_deref().unwrap_or_default();
    let name = notice.name.as_deref().unwrap_or_default();
    let net30 = notice.is_net30();

    let mut subject = format!("New Order {reference} {DASH} {name}");
    if net30 {
        subject.push_str(" [Net 30 Application]");
    }

    let mut body = String::new();
    body.push_str(&section("Client"));
    body.push_str(&row("Name", &strong(&text(notice.name.as_deref()))));
    body.push_str(&row("Email", &mailto(notice.email.as_deref())));
    if let Some(company) = present(&notice.company) {
        body.push_str(&row("Company", &escape(company)));
    }
    body.push_str(&section("Project"));
    body.push_str(&row("Address", &strong(&text(notice.address.as_deref()))));
    body.push_str(&row("Floors", &value_text(notice.floors.as_ref())));
    body.push_str(&row("Style", &text(notice.style.as_deref())));

    body.push_str(&section("Pricing"));
    body.push_str(&addon_rows(notice.addons.as_ref()));
    let total = format!("${}", value_text(notice.total.as_ref()));
    body.push_str(&row("<strong>Total</strong>", &strong(&total)));
    let deposit_label = if net30 {
        format!("Deposit (Invoice {DASH} Net 30)")
    } else {
        "Deposit (Paid via Stripe)".to_string()
    };
    let deposit = format!("${}", value_text(notice.deposit.as_ref()));
    body.push_str(&row(&deposit_label, &deposit));

    if net30 {
        body.push_str(&net30_block(notice.net30.as_ref()));
    }
    if let Some(notes) = present(&notice.notes) {
        body.push_str(&section("Client Notes"));
        body.push_str(&note_block(notes));
    }

    Rendered {
        subject,
        html: layout(
            "New Floor Plan Order",
            &escape(reference),
            None,
            &body,
            &button(dashboard_url, "Open in Admin Dashboard"),
        ),
    }
}

pub fn quote_notification(notice: &QuoteNotice, dashboard_url: &str) -> Rendered {
    let reference = notice.reference.as_deref().unwrap_or_default();
    let project = notice.project_name.as_deref().unwrap_or_default();
    let name = notice.name.as_deref().unwrap_or_default();
    let subject = format!("New Quote Request {reference} {DASH} {project} ({name})");

    let mut body = String::new();
    body.push_str(&section("Client"));
    body.push_str(&row("Name", &strong(&text(notice.name.as_deref()))));
    body.push_str(&row("Email", &mailto(notice.email.as_deref())));
    if let Some(company) = present(&notice.company) {
        body.push_str(&row("Company", &escape(company)));
    }
    if let Some(role) = present(&notice.role) {
        body.push_str(&row("Role", &escape(role)));
    }

    body.push_str(&section("Project"));
    body.push_str(&row("Name", &strong(&text(notice.project_name.as_deref()))));
    if let Some(kind) = present(&notice.project_type) {
        body.push_str(&row("Type", &escape(kind)));
    }
    if let Some(city) = present(&notice.city) {
        body.push_str(&row("Location", &escape(city)));
    }
    if let Some(phases) = notice.phases.as_ref().and_then(as_count).filter(|phases| *phases > 1) {
        body.push_str(&row("Phases", &phases.to_string()));
    }
    body.push_str(&row("Complexity", &escape(&complexity_label(notice.complexity.as_deref()))));
    body.push_str(&row("Timeline", &escape(&timeline_label(notice.timeline.as_deref()))));

    body.push_str(&section("Renderings Requested"));
    body.push_str(&render_rows(notice.renders.as_ref()));

    body.push_str(&section("Estimate"));
    if let Some(low) = notice.estimate_low.as_ref().filter(|low| truthy(low)) {
        let high = money(notice.estimate_high.as_ref());
        let range = format!("${} \u{2013} ${high}", money(Some(low)));
        body.push_str(&row("Estimate Range", &strong(&range)));
    }
    let files = notice.total_files.as_ref().and_then(as_count).unwrap_or(0);
    let mut uploaded = format!("{files} uploaded");
    if let Some(link) = present(&notice.shared_link) {
        let _ = write!(
            uploaded,
            " &middot; <a href=\"{}\" style=\"color:#4B2EC5;\">Shared link</a>",
            escape(link)
        );
    }
    body.push_str(&row("Reference Files", &uploaded));

    if let Some(notes) = present(&notice.notes) {
        body.push_str(&section("Notes"));
        body.push_str(&note_block(notes));
    }

    Rendered {
        subject,
        html: layout(
            "New Quote Request",
            &escape(reference),
            Some(&escape(project)),
            &body,
            &button(dashboard_url, "Open in Admin Dashboard"),
        ),
    }
}

pub fn review_confirmation(review: &ReviewSummary<'_>, dashboard_url: &str) -> Rendered {
    let title = review
        .project_name
        .filter(|name| !name.is_empty())
        .unwrap_or(review.order_ref);
    let subject = format!("Review Complete {DASH} {title} ({})", review.stage_label);

    let mut body = format!(
        "<p style=\"font-size:15px;color:#333;line-height:1.6;\"><strong>{}</strong> has confirmed that all review comments for <strong>{}</strong> are complete and submitted in ReviewStudio.</p>",
        escape(review.reviewer),
        escape(review.stage_label),
    );
    let _ = write!(
        body,
        "<div style=\"background:#F0FDF4;border:1px solid #86EFAC;border-radius:10px;padding:16px 20px;margin:20px 0;\">\
         <div style=\"font-size:12px;font-weight:700;color:#16A34A;text-transform:uppercase;\">Stage Updated</div>\
         <div style=\"font-size:14px;color:#333;\">{} &rarr; {}</div></div>",
        escape(review.stage_label),
        escape(&title_case(review.next_stage)),
    );
    body.push_str(
        "<p style=\"font-size:13px;color:#666;\">You can now review the comments in ReviewStudio and begin revisions.</p>",
    );

    Rendered {
        subject,
        html: layout(
            "Review Confirmed",
            &escape(title),
            Some(&escape(review.order_ref)),
            &body,
            &button(dashboard_url, "Open in Admin Dashboard"),
        ),
    }
}

pub fn contact_message(message: &ContactMessage) -> Rendered {
    let first = message.first.as_deref().unwrap_or_default();
    let last = message.last.as_deref().unwrap_or_default();
    let topic = present(&message.subject).unwrap_or("General Inquiry");
    let subject = format!("Contact Form {DASH} {topic} {DASH} {first} {last}");

    let mut from_line = escape(message.email.as_deref().unwrap_or_default());
    if let Some(company) = present(&message.company) {
        let _ = write!(from_line, " &middot; {}", escape(company));
    }
    let body = format!(
        "<div style=\"font-size:15px;color:#333;margin-bottom:20px;\">{}</div>\
         <div style=\"font-size:15px;color:#333;line-height:1.7;white-space:pre-wrap;\">{}</div>",
        escape(topic),
        escape(message.message.as_deref().unwrap_or_default()),
    );
    let reply = format!(
        "mailto:{}",
        message.email.as_deref().unwrap_or_default()
    );

    Rendered {
        subject,
        html: layout(
            "Contact Form",
            &escape(&format!("{first} {last}")),
            Some(&from_line),
            &body,
            &button(&reply, &format!("Reply to {}", first)),
        ),
    }
}

pub fn escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            other => out.push(other),
        }
    }
    out
}

/// Whole-number part grouped in thousands, up to three decimals kept.
pub fn thousands(value: f64) -> String {
    let negative = value < 0.0;
    let scaled = (value.abs() * 1000.0).round() as u128;
    let whole = (scaled / 1000).to_string();
    let fraction = scaled % 1000;

    let mut grouped = String::new();
    for (index, digit) in whole.chars().enumerate() {
        if index > 0 && (whole.len() - index) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }
    if fraction > 0 {
        let digits = format!("{fraction:03}");
        grouped.push('.');
        grouped.push_str(digits.trim_end_matches('0'));
    }
    if negative {
        grouped.insert(0, '-');
    }
    grouped
}

/// `final-draft-ready` becomes `Final Draft Ready`.
pub fn title_case(stage: &str) -> String {
    stage
        .split('-')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn complexity_label(raw: Option<&str>) -> String {
    match raw {
        Some("standard") => "Standard".into(),
        Some("premium") => "Premium".into(),
        Some("luxury") => "Luxury".into(),
        Some(other) if !other.is_empty() => other.into(),
        _ => DASH.into(),
    }
}

fn timeline_label(raw: Option<&str>) -> String {
    match raw {
        Some("standard") => "Standard".into(),
        Some("expedited") => "Expedited (+20%)".into(),
        Some("urgent") => "Urgent (+40%)".into(),
        Some(other) if !other.is_empty() => other.into(),
        _ => DASH.into(),
    }
}

fn render_label(kind: &str) -> &str {
    match kind {
        "interior" => "Interior",
        "exterior" => "Exterior",
        "aerial" => "Aerial",
        "tour" => "360\u{b0} Tour",
        "flythrough" => "Fly-Through",
        other => other,
    }
}

fn render_rows(renders: Option<&Value>) -> String {
    let rows: String = match renders {
        Some(Value::Object(selected)) => selected
            .iter()
            .map(|(kind, selection)| render_row(kind, selection))
            .collect(),
        Some(Value::Array(kinds)) => kinds
            .iter()
            .map(|kind| match kind {
                Value::String(kind) => render_row(kind, &Value::Null),
                other => render_row(&other.to_string(), &Value::Null),
            })
            .collect(),
        _ => String::new(),
    };
    if rows.is_empty() {
        "<tr><td colspan=\"2\" style=\"color:#999;font-size:13px;\">Not specified</td></tr>".into()
    } else {
        rows
    }
}

fn render_row(kind: &str, selection: &Value) -> String {
    let views = selection
        .get("views")
        .and_then(as_count)
        .filter(|views| *views > 0)
        .unwrap_or(1);
    let plural = if views > 1 { "s" } else { "" };
    row(&escape(render_label(kind)), &format!("{views} view{plural}"))
}

/// Priced add-ons arrive as a `name -> price` map; a bare list of names is
/// accepted too. Keys starting with `_` are checkout metadata.
fn addon_rows(addons: Option<&Value>) -> String {
    let rows: String = match addons {
        Some(Value::Object(priced)) => priced_addon_rows(priced),
        Some(Value::Array(names)) => names
            .iter()
            .map(|name| value_text(Some(name)))
            .filter(|name| !name.starts_with('_'))
            .map(|name| row(&name, "Included"))
            .collect(),
        _ => String::new(),
    };
    if rows.is_empty() { none_row() } else { rows }
}

fn priced_addon_rows(priced: &Map<String, Value>) -> String {
    priced
        .iter()
        .filter(|(name, _)| !name.starts_with('_'))
        .map(|(name, price)| row(&escape(name), &format!("+${}", value_text(Some(price)))))
        .collect()
}

fn none_row() -> String {
    "<tr><td colspan=\"2\" style=\"padding:6px 0;color:#999;font-size:13px;\">None</td></tr>".into()
}

fn net30_block(application: Option<&Value>) -> String {
    let mut block = String::from(
        "<tr><td colspan=\"2\" style=\"padding-top:20px;\"><div style=\"background:#FFF8E1;border:1.5px solid #F0C040;border-radius:10px;padding:16px;\">\
         <div style=\"font-size:11px;font-weight:700;text-transform:uppercase;color:#B07D00;margin-bottom:10px;\">Net 30 Invoice Application</div>\
         <table width=\"100%\" style=\"font-size:13px;color:#333;\">",
    );
    for (label, key) in [
        ("Legal Entity:", "entity"),
        ("Billing Contact:", "contact"),
        ("Billing Email:", "email"),
        ("Billing Phone:", "phone"),
        ("Billing Address:", "address"),
    ] {
        let value = application.and_then(|application| application.get(key));
        block.push_str(&row(label, &strong(&value_text(value))));
    }
    block.push_str("</table></div></td></tr>");
    block
}

fn layout(kicker: &str, title: &str, subtitle: Option<&str>, body: &str, footer: &str) -> String {
    let subtitle = subtitle
        .map(|line| {
            format!(
                "<div style=\"font-size:13px;color:rgba(255,255,255,0.8);margin-top:4px;\">{line}</div>"
            )
        })
        .unwrap_or_default();
    format!(
        "<!DOCTYPE html><html><body style=\"margin:0;padding:0;background:#F7F5FF;font-family:'DM Sans',Arial,sans-serif;\">\
         <div style=\"max-width:560px;margin:40px auto;background:white;border-radius:16px;overflow:hidden;\">\
         <div style=\"background:linear-gradient(135deg,#4B2EC5,#2AB5A0);padding:28px 32px;\">\
         <div style=\"font-size:11px;font-weight:700;text-transform:uppercase;color:rgba(255,255,255,0.7);margin-bottom:4px;\">{kicker}</div>\
         <div style=\"font-size:26px;font-weight:700;color:white;\">{title}</div>{subtitle}</div>\
         <div style=\"padding:28px 32px;\"><table width=\"100%\" cellpadding=\"0\" cellspacing=\"0\">{body}</table></div>\
         <div style=\"background:#F7F5FF;padding:20px 32px;text-align:center;\">{footer}</div>\
         </div></body></html>"
    )
}

fn section(title: &str) -> String {
    format!(
        "<tr><td colspan=\"2\" style=\"padding:20px 0 6px;\"><div style=\"font-size:11px;font-weight:700;text-transform:uppercase;color:#9B87E8;\">{title}</div></td></tr>"
    )
}

fn row(label: &str, value: &str) -> String {
    format!(
        "<tr><td style=\"padding:4px 0;color:#666;font-size:13px;\">{label}</td><td style=\"padding:4px 0;font-size:13px;\">{value}</td></tr>"
    )
}

fn strong(value: &str) -> String {
    format!("<strong>{value}</strong>")
}

fn mailto(email: Option<&str>) -> String {
    let email = escape(email.unwrap_or_default());
    format!("<a href=\"mailto:{email}\" style=\"color:#4B2EC5;\">{email}</a>")
}

fn note_block(notes: &str) -> String {
    format!(
        "<tr><td colspan=\"2\"><div style=\"font-size:13px;color:#444;line-height:1.7;background:#F7F5FF;border-radius:8px;padding:12px;\">{}</div></td></tr>",
        escape(notes)
    )
}

fn button(href: &str, label: &str) -> String {
    format!(
        "<a href=\"{}\" style=\"display:inline-block;background:linear-gradient(135deg,#4B2EC5,#2AB5A0);color:white;text-decoration:none;padding:12px 28px;border-radius:10px;font-weight:600;font-size:14px;\">{} &rarr;</a>",
        escape(href),
        escape(label)
    )
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|value| !value.trim().is_empty())
}

fn text(value: Option<&str>) -> String {
    match value {
        Some(value) if !value.is_empty() => escape(value),
        _ => DASH.to_string(),
    }
}

fn value_text(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => DASH.to_string(),
        Some(Value::String(raw)) => text(Some(raw)),
        Some(other) => escape(&other.to_string()),
    }
}

fn as_count(value: &Value) -> Option<u64> {
    value
        .as_u64()
        .or_else(|| value.as_f64().filter(|n| *n >= 0.0).map(|n| n as u64))
        .or_else(|| value.as_str().and_then(|raw| raw.trim().parse().ok()))
}

fn as_amount(value: &Value) -> Option<f64> {
    value.as_f64().or_else(|| {
        let raw = value.as_str()?.trim().trim_start_matches('$').replace(',', "");
        raw.parse().ok()
    })
}

/// Grouped amount when the value reads as a number, raw text otherwise.
fn money(value: Option<&Value>) -> String {
    match value.and_then(as_amount) {
        Some(amount) => thousands(amount),
        None => value_text(value),
    }
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::Number(number) => number.as_f64().is_some_and(|n| n != 0.0),
        Value::String(raw) => !raw.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}
