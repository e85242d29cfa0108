//! Form page for interactive predictions

use super::api::run_prediction;
use super::AppState;
use crate::schema::{self, FieldKind, FieldSpec};
use crate::types::{ChurnLabel, ChurnPrediction, FieldValue, RawRecord};
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Html;
use axum::Form;
use std::collections::HashMap;
use std::fmt::Write;

/// Starting values for the numeric inputs
const NUMERIC_DEFAULTS: &[(&str, &str)] = &[
    ("tenure", "12"),
    ("MonthlyCharges", "70.00"),
    ("TotalCharges", "2500.00"),
];

enum Outcome {
    Prediction(ChurnPrediction),
    Error(String),
}

/// `GET /`
pub async fn form_page() -> Html<String> {
    Html(render(&HashMap::new(), None))
}

/// `POST /`
pub async fn submit_form(
    State(state): State<AppState>,
    Form(values): Form<HashMap<String, String>>,
) -> (StatusCode, Html<String>) {
    let record: RawRecord = schema::input_fields()
        .filter_map(|f| values.get(f.name).map(|v| (f.name.to_string(), FieldValue::from(v.as_str()))))
        .collect();

    match run_prediction(&state, &record) {
        Ok(prediction) => (
            StatusCode::OK,
            Html(render(&values, Some(Outcome::Prediction(prediction)))),
        ),
        Err(e) => (
            e.status(),
            Html(render(&values, Some(Outcome::Error(e.message().to_string())))),
        ),
    }
}

fn render(values: &HashMap<String, String>, outcome: Option<Outcome>) -> String {
    let mut html = String::from(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n\
         <title>Customer Churn Prediction</title>\n</head>\n<body>\n\
         <h1>Customer Churn Prediction</h1>\n\
         <p>Predict whether a customer is likely to churn based on their account information.</p>\n\
         <form method=\"post\" action=\"/\">\n",
    );

    for field in schema::input_fields() {
        let current = values.get(field.name).map(String::as_str);
        let _ = writeln!(
            html,
            "<p><label for=\"{name}\">{label}</label> {control}</p>",
            name = field.name,
            label = label(field.name),
            control = control(field, current),
        );
    }
    html.push_str("<button type=\"submit\">Predict Churn</button>\n</form>\n");

    match outcome {
        Some(Outcome::Prediction(prediction)) => {
            let verdict = match prediction.label {
                ChurnLabel::Churn => "Churn Likely",
                ChurnLabel::NoChurn => "No Churn",
            };
            let _ = write!(
                html,
                "<hr>\n<h2>Prediction Result</h2>\n<p><strong>{verdict}</strong></p>\n\
                 <p>Churn Probability: {:.2}%</p>\n",
                prediction.probability_percent()
            );
        }
        Some(Outcome::Error(message)) => {
            let _ = write!(
                html,
                "<hr>\n<h2>Invalid input</h2>\n<p>{}</p>\n",
                escape(&message)
            );
        }
        None => {}
    }

    html.push_str("</body>\n</html>\n");
    html
}

fn control(field: &FieldSpec, current: Option<&str>) -> String {
    match field.kind {
        FieldKind::Numeric(_) => {
            let value = current
                .or_else(|| {
                    NUMERIC_DEFAULTS
                        .iter()
                        .find(|(name, _)| *name == field.name)
                        .map(|(_, v)| *v)
                })
                .unwrap_or("0");
            let step = if field.name == "tenure" { "1" } else { "0.01" };
            format!(
                "<input type=\"number\" id=\"{0}\" name=\"{0}\" min=\"0\" step=\"{step}\" value=\"{1}\">",
                field.name,
                escape(value)
            )
        }
        _ => {
            let mut select = format!("<select id=\"{0}\" name=\"{0}\">", field.name);
            for option in field.domain {
                let selected = if current == Some(*option) { " selected" } else { "" };
                let _ = write!(select, "<option value=\"{option}\"{selected}>{option}</option>");
            }
            select.push_str("</select>");
            select
        }
    }
}

/// `MonthlyCharges` -> `Monthly Charges`, `tenure` -> `Tenure`
fn label(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    let mut prev_lower = false;
    for (i, c) in name.chars().enumerate() {
        if c.is_uppercase() && prev_lower {
            out.push(' ');
        }
        if i == 0 {
            out.extend(c.to_uppercase());
        } else {
            out.push(c);
        }
        prev_lower = c.is_lowercase();
    }
    out
}

fn escape(text: &str) -> String {
    text.chars()
        .fold(String::with_capacity(text.len()), |mut out, c| {
            match c {
                '&' => out.push_str("&amp;"),
                '<' => out.push_str("&lt;"),
                '>' => out.push_str("&gt;"),
                '"' => out.push_str("&quot;"),
                '\'' => out.push_str("&#39;"),
                c => out.push(c),
            }
            out
        })
}
