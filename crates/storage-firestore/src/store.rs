//! Portfolio records and instrument mappings kept in Firestore collections.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use folio_core::errors::Result;
use folio_core::{PortfolioRecord, PortfolioStore, RecordSchema};
use folio_market_data::{InstrumentId, InstrumentMapping, MappingStore, MarketDataError, Ticker};
use log::{debug, warn};
use num_traits::ToPrimitive;
use rust_decimal::Decimal;
use serde_json::{Map, Value};

use crate::client::{CommitResponse, FirestoreClient, Write};
use crate::errors::StorageError;
use crate::value::{decode_fields, decode_value, double_value, encode_value, field_path};

/// The portfolio collection, read and written through a [`RecordSchema`].
pub struct FirestoreStore {
    client: Arc<FirestoreClient>,
    collection: String,
    schema: RecordSchema,
}

impl FirestoreStore {
    pub fn new(
        client: Arc<FirestoreClient>,
        collection: impl Into<String>,
        schema: RecordSchema,
    ) -> Self {
        Self {
            client,
            collection: collection.into(),
            schema,
        }
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    async fn patch(&self, write: Write) -> std::result::Result<CommitResponse, StorageError> {
        self.client.commit(std::slice::from_ref(&write)).await
    }
}

#[async_trait]
impl PortfolioStore for FirestoreStore {
    async fn load_records(&self) -> Result<Vec<PortfolioRecord>> {
        let documents = self.client.list_documents(&self.collection).await?;
        Ok(documents
            .iter()
            .map(|doc| self.schema.read_record(doc.id(), &decode_fields(&doc.fields)))
            .collect())
    }

    async fn set_instrument_id(&self, record_id: &str, instrument_id: &InstrumentId) -> Result<()> {
        let field = &self.schema.instrument_id_field;
        let mut fields = Map::new();
        fields.insert(
            field.clone(),
            encode_value(&self.schema.instrument_id_value(instrument_id)),
        );

        let write = Write::patch(
            self.client.document_name(&self.collection, record_id),
            fields,
            vec![field_path(field)],
        );
        self.patch(write).await?;
        debug!("{}/{}: {} = {}", self.collection, record_id, field, instrument_id);
        Ok(())
    }

    async fn update_price(&self, record_id: &str, price: Decimal) -> Result<DateTime<Utc>> {
        let value = price.to_f64().ok_or_else(|| {
            StorageError::Serialization(format!("price {} is not representable", price))
        })?;
        let field = &self.schema.price_field;
        let mut fields = Map::new();
        fields.insert(field.clone(), double_value(value));

        let write = Write::patch(
            self.client.document_name(&self.collection, record_id),
            fields,
            vec![field_path(field)],
        )
        .with_request_time(field_path(&self.schema.updated_at_field));

        let response = self.patch(write).await?;
        Ok(write_time(&response).unwrap_or_else(|| {
            warn!("{}/{}: commit returned no timestamp", self.collection, record_id);
            Utc::now()
        }))
    }
}

/// Server time of a commit: the transform result, else the commit time.
fn write_time(response: &CommitResponse) -> Option<DateTime<Utc>> {
    response
        .write_results
        .first()
        .and_then(|result| result.transform_results.first())
        .map(decode_value)
        .and_then(|value| value.as_str().map(str::to_string))
        .or_else(|| response.commit_time.clone())
        .and_then(|raw| DateTime::parse_from_rfc3339(&raw).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

/// Instrument mappings, one document per `(provider, ticker)`.
pub struct FirestoreMappingStore {
    client: Arc<FirestoreClient>,
    collection: String,
}

impl FirestoreMappingStore {
    pub fn new(client: Arc<FirestoreClient>, collection: impl Into<String>) -> Self {
        Self {
            client,
            collection: collection.into(),
        }
    }
}

/// `{PROVIDER}_{TICKER}`; `/` cannot appear in a document id.
fn mapping_document_id(provider: &str, ticker: &Ticker) -> String {
    format!("{}_{}", provider.to_uppercase(), ticker.as_str().replace('/', "_"))
}

fn mapping_instrument_id(fields: &Map<String, Value>) -> Option<InstrumentId> {
    let fields = decode_fields(fields);
    match fields.get("instrumentId")? {
        Value::Number(n) => n.as_i64().map(InstrumentId::from),
        Value::String(s) if !s.trim().is_empty() => Some(InstrumentId::new(s)),
        _ => None,
    }
}

#[async_trait]
impl MappingStore for FirestoreMappingStore {
    async fn get(
        &self,
        provider: &str,
        ticker: &Ticker,
    ) -> std::result::Result<Option<InstrumentId>, MarketDataError> {
        let id = mapping_document_id(provider, ticker);
        let document = self.client.get_document(&self.collection, &id).await?;
        Ok(document.and_then(|doc| mapping_instrument_id(&doc.fields)))
    }

    async fn put(
        &self,
        mapping: &InstrumentMapping,
    ) -> std::result::Result<InstrumentId, MarketDataError> {
        let id = mapping_document_id(&mapping.provider, &mapping.ticker);
        let instrument_value = match mapping.instrument_id.as_i64() {
            Some(n) => Value::from(n),
            None => Value::from(mapping.instrument_id.as_str()),
        };

        let mut fields = Map::new();
        fields.insert(
            "provider".to_string(),
            encode_value(&Value::from(mapping.provider.to_string())),
        );
        fields.insert("ticker".to_string(), encode_value(&Value::from(mapping.ticker.as_str())));
        fields.insert("instrumentId".to_string(), encode_value(&instrument_value));

        let write = Write::create(self.client.document_name(&self.collection, &id), fields);
        match self.client.commit(std::slice::from_ref(&write)).await {
            Ok(_) => Ok(mapping.instrument_id.clone()),
            Err(StorageError::AlreadyExists(_)) => {
                debug!("{}: mapping already stored, keeping it", id);
                let stored = self.get(&mapping.provider, &mapping.ticker).await?;
                Ok(stored.unwrap_or_else(|| mapping.instrument_id.clone()))
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn object(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected an object"),
        }
    }

    #[test]
    fn test_mapping_document_id() {
        let ticker = Ticker::parse("brk/b").unwrap();
        assert_eq!(mapping_document_id("etoro", &ticker), "ETORO_BRK_B");
        let ticker = Ticker::parse("aapl").unwrap();
        assert_eq!(mapping_document_id("ETORO", &ticker), "ETORO_AAPL");
    }

    #[test]
    fn test_mapping_instrument_id() {
        let numeric = object(json!({ "instrumentId": { "integerValue": "1001" } }));
        assert_eq!(mapping_instrument_id(&numeric), Some(InstrumentId::from(1001)));

        let symbol = object(json!({ "instrumentId": { "stringValue": "ENI.MI" } }));
        assert_eq!(mapping_instrument_id(&symbol), Some(InstrumentId::new("ENI.MI")));

        assert_eq!(mapping_instrument_id(&Map::new()), None);
    }

    #[test]
    fn test_write_time_prefers_transform_result() {
        let response: CommitResponse = serde_json::from_value(json!({
            "writeResults": [{
                "transformResults": [{ "timestampValue": "2026-10-18T08:00:01Z" }]
            }],
            "commitTime": "2026-10-18T08:00:02Z"
        }))
        .unwrap();
        assert_eq!(
            write_time(&response).unwrap().to_rfc3339(),
            "2026-10-18T08:00:01+00:00"
        );
    }

    #[test]
    fn test_write_time_falls_back_to_commit_time() {
        let response: CommitResponse = serde_json::from_value(json!({
            "writeResults": [{}],
            "commitTime": "2026-10-18T08:00:02Z"
        }))
        .unwrap();
        assert_eq!(
            write_time(&response).unwrap().to_rfc3339(),
            "2026-10-18T08:00:02+00:00"
        );
        assert!(write_time(&CommitResponse::default()).is_none());
    }

    #[test]
    fn test_record_decoding_through_schema() {
        let fields = object(json!({
            "nome": { "stringValue": "bbb" },
            "instrumentId": { "integerValue": "42" },
            "prezzo_corrente": { "doubleValue": 100.5 }
        }));
        let record = RecordSchema::default().read_record("b", &decode_fields(&fields));

        assert_eq!(record.ticker, Ticker::parse("BBB"));
        assert_eq!(record.instrument_id, Some(InstrumentId::from(42)));
        assert_eq!(record.price, Some(rust_decimal_macros::dec!(100.5)));
    }
}
