use serde::{de::DeserializeOwned, Deserialize};
use serde_json::Value;
use shared::{error::Fault, protocol::Pagination};

pub const DEFAULT_SUCCESS_MESSAGE: &str = "Success";
pub const DEFAULT_ERROR_MESSAGE: &str = "An error occurred";

#[derive(Debug, Default, Deserialize)]
struct Envelope {
    data: Option<Value>,
    items: Option<Value>,
    message: Option<Value>,
    #[serde(rename = "_message")]
    underscore_message: Option<Value>,
    detail: Option<Value>,
    title: Option<Value>,
    errors: Option<Value>,
    pagination: Option<Value>,
    page: Option<Value>,
    limit: Option<Value>,
    total: Option<Value>,
}

#[derive(Debug)]
enum ResponseBody {
    Envelope { fields: Envelope, raw: Value },
    Sequence(Value),
    Scalar(Value),
}

impl ResponseBody {
    fn decode(body: &Value) -> Self {
        match body {
            Value::Object(_) => ResponseBody::Envelope {
                fields: Envelope::deserialize(body).unwrap_or_default(),
                raw: body.clone(),
            },
            Value::Array(_) => ResponseBody::Sequence(body.clone()),
            other => ResponseBody::Scalar(other.clone()),
        }
    }

    fn fields(&self) -> Option<&Envelope> {
        match self {
            ResponseBody::Envelope { fields, .. } => Some(fields),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedResponse {
    pub data: Value,
    pub message: String,
    pub pagination: Pagination,
}

impl NormalizedResponse {
    pub fn records<T: DeserializeOwned>(&self) -> Result<Vec<T>, serde_json::Error> {
        Vec::<T>::deserialize(&self.data)
    }

    pub fn record<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        T::deserialize(&self.data)
    }
}

pub fn normalize_success(body: &Value) -> NormalizedResponse {
    NormalizedResponse {
        data: extract_data(body),
        message: extract_message(body),
        pagination: extract_pagination(body),
    }
}

pub fn normalize_failure(fault: &Fault) -> String {
    extract_error(&fault.envelope())
}

/// `data`, else `items`, else the body itself.
pub fn extract_data(body: &Value) -> Value {
    match ResponseBody::decode(body) {
        ResponseBody::Envelope { fields, raw } => fields.data.or(fields.items).unwrap_or(raw),
        ResponseBody::Sequence(items) => items,
        ResponseBody::Scalar(value) => value,
    }
}

pub fn extract_message(body: &Value) -> String {
    let decoded = ResponseBody::decode(body);
    let Some(fields) = decoded.fields() else {
        return DEFAULT_SUCCESS_MESSAGE.to_string();
    };

    let message = [
        fields.message.as_ref(),
        fields.underscore_message.as_ref(),
        fields.data.as_ref().and_then(|data| data.get("message")),
        fields.detail.as_ref(),
        fields.title.as_ref(),
    ]
    .into_iter()
    .find_map(present_text)
    .or_else(|| join_errors(fields.errors.as_ref()))
    .unwrap_or_else(|| DEFAULT_SUCCESS_MESSAGE.to_string());
    message
}

pub fn extract_pagination(body: &Value) -> Pagination {
    let decoded = ResponseBody::decode(body);
    let Some(fields) = decoded.fields() else {
        return Pagination::default();
    };

    if let Some(pagination) = fields.pagination.as_ref().filter(|p| p.is_object()) {
        return pagination_from(
            pagination.get("page"),
            pagination.get("limit"),
            pagination.get("total"),
        );
    }

    pagination_from(
        fields.page.as_ref(),
        fields.limit.as_ref(),
        fields.total.as_ref(),
    )
}

/// Display text for a failure envelope `{message?, data?, errors?}`.
pub fn extract_error(fault: &Value) -> String {
    let decoded = ResponseBody::decode(fault);
    let Some(fields) = decoded.fields() else {
        return DEFAULT_ERROR_MESSAGE.to_string();
    };
    let nested = |key: &str| fields.data.as_ref().and_then(|data| data.get(key));

    let error = [
        fields.message.as_ref(),
        nested("detail"),
        nested("title"),
        nested("message"),
    ]
    .into_iter()
    .find_map(present_text)
    .or_else(|| join_errors(fields.errors.as_ref()))
    .unwrap_or_else(|| DEFAULT_ERROR_MESSAGE.to_string());
    error
}

fn present_text(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(text) if !text.is_empty() => Some(text.clone()),
        _ => None,
    }
}

fn join_errors(errors: Option<&Value>) -> Option<String> {
    let entries = errors?.as_array().filter(|entries| !entries.is_empty())?;
    let joined = entries
        .iter()
        .map(|entry| match entry {
            Value::String(text) => text.clone(),
            Value::Object(_) => present_text(entry.get("message"))
                .or_else(|| present_text(entry.get("error")))
                .unwrap_or_else(|| entry.to_string()),
            other => other.to_string(),
        })
        .collect::<Vec<_>>()
        .join(", ");
    Some(joined)
}

fn pagination_from(page: Option<&Value>, limit: Option<&Value>, total: Option<&Value>) -> Pagination {
    let defaults = Pagination::default();
    Pagination {
        page: page.and_then(as_count).unwrap_or(defaults.page),
        limit: limit.and_then(as_count).unwrap_or(defaults.limit),
        total: total.and_then(as_count).unwrap_or(defaults.total),
    }
}

fn as_count(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64)),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
#[path = "tests/normalizer_tests.rs"]
mod tests;
