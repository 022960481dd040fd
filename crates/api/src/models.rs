use serde_json::Value;

#[derive(Debug, Clone)]
pub struct Venue {
    pub id: String,
    pub name: String,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub raw: Value,
}

#[derive(Debug, Clone)]
pub struct FieldType {
    pub id: String,
    pub name: String,
    pub category: Option<String>,
    pub raw: Value,
}
