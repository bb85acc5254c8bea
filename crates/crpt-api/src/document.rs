//! Document payload for the "introduce goods" registration call.
//!
//! Field names follow the CRPT wire format, which mixes snake_case with a few
//! camelCase keys (`importRequest`, `description.participantInn`). Dates are
//! calendar dates serialized as `YYYY-MM-DD`.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    #[serde(default)]
    pub description: Option<Description>,
    pub doc_id: String,
    pub doc_status: String,
    pub doc_type: String,
    #[serde(rename = "importRequest", default)]
    pub import_request: bool,
    pub owner_inn: String,
    pub participant_inn: String,
    pub producer_inn: String,
    pub production_date: NaiveDate,
    pub production_type: String,
    #[serde(default)]
    pub products: Vec<Product>,
    pub reg_date: NaiveDate,
    pub reg_number: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Description {
    #[serde(rename = "participantInn")]
    pub participant_inn: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub certificate_document: String,
    pub certificate_document_date: NaiveDate,
    pub certificate_document_number: String,
    pub owner_inn: String,
    pub producer_inn: String,
    pub production_date: NaiveDate,
    pub tnved_code: String,
    pub uit_code: String,
    pub uitu_code: String,
}

impl Document {
    /// Request body for the registration endpoint.
    pub fn to_payload(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2020, 1, 23).unwrap()
    }

    pub(crate) fn sample_document() -> Document {
        Document {
            description: Some(Description {
                participant_inn: "7701234567".to_string(),
            }),
            doc_id: "doc-0001".to_string(),
            doc_status: "DRAFT".to_string(),
            doc_type: "LP_INTRODUCE_GOODS".to_string(),
            import_request: true,
            owner_inn: "7701234567".to_string(),
            participant_inn: "7701234567".to_string(),
            producer_inn: "7707654321".to_string(),
            production_date: date(),
            production_type: "OWN_PRODUCTION".to_string(),
            products: vec![Product {
                certificate_document: "CONFORMITY_CERTIFICATE".to_string(),
                certificate_document_date: date(),
                certificate_document_number: "RU-C-001".to_string(),
                owner_inn: "7701234567".to_string(),
                producer_inn: "7707654321".to_string(),
                production_date: date(),
                tnved_code: "6403990000".to_string(),
                uit_code: "010463003407001221SxMGorvNuq6Wk91fgr92sdfgb".to_string(),
                uitu_code: "".to_string(),
            }],
            reg_date: date(),
            reg_number: "REG-42".to_string(),
        }
    }

    #[test]
    fn document_wire_format() {
        insta::assert_json_snapshot!("document_wire_format", sample_document());
    }

    #[test]
    fn dates_serialize_as_calendar_dates() {
        let payload = sample_document().to_payload().unwrap();
        let value: serde_json::Value = serde_json::from_str(&payload).unwrap();
        assert_eq!(value["production_date"], "2020-01-23");
        assert_eq!(value["products"][0]["certificate_document_date"], "2020-01-23");
    }

    #[test]
    fn camel_case_keys_preserved() {
        let value = serde_json::to_value(sample_document()).unwrap();
        assert_eq!(value["importRequest"], true);
        assert_eq!(value["description"]["participantInn"], "7701234567");
        assert!(value.get("import_request").is_none());
    }

    #[test]
    fn missing_description_is_sent_as_null() {
        let document = Document {
            description: None,
            ..sample_document()
        };
        let value = serde_json::to_value(&document).unwrap();
        assert_eq!(value.get("description"), Some(&serde_json::Value::Null));
    }

    #[test]
    fn parses_minimal_document() {
        let json = r#"{
            "doc_id": "d1",
            "doc_status": "DRAFT",
            "doc_type": "LP_INTRODUCE_GOODS",
            "owner_inn": "1",
            "participant_inn": "2",
            "producer_inn": "3",
            "production_date": "2024-02-29",
            "production_type": "OWN_PRODUCTION",
            "reg_date": "2024-03-01",
            "reg_number": "R1"
        }"#;

        let doc: Document = serde_json::from_str(json).unwrap();
        assert!(doc.description.is_none());
        assert!(!doc.import_request);
        assert!(doc.products.is_empty());
        assert_eq!(
            doc.production_date,
            NaiveDate::from_ymd_opt(2024, 2, 29).unwrap()
        );
    }

    #[test]
    fn rejects_malformed_date() {
        let mut value = serde_json::to_value(sample_document()).unwrap();
        value["reg_date"] = serde_json::json!("23.01.2020");
        assert!(serde_json::from_value::<Document>(value).is_err());
    }
}
