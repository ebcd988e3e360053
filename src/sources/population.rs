use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

use crate::models::{PopulationRecord, SkipReason};
use crate::sources::{classify_response, is_blank, Transport};
use crate::utils::columns::{coerce_numeric, extract_numeric_id, normalize_column_name};
use crate::utils::constants::{BULK_LOCALITY_COLUMNS, BULK_VALUE_COLUMNS, BULK_YEAR_COLUMNS};

/// Response of the aggregates endpoint: `[variable].resultados[].series[].serie`.
/// Missing levels deserialize as empty and are reported as an empty payload.
#[derive(Debug, Deserialize)]
struct AggregateVariable {
    #[serde(default)]
    resultados: Vec<AggregateResult>,
}

#[derive(Debug, Deserialize)]
struct AggregateResult {
    #[serde(default)]
    series: Vec<AggregateSeries>,
}

#[derive(Debug, Deserialize)]
struct AggregateSeries {
    #[serde(default)]
    serie: BTreeMap<String, Value>,
}

pub struct PopulationClient {
    transport: Arc<dyn Transport>,
    base_url: String,
    variable: u32,
    locality_level: String,
}

impl PopulationClient {
    pub fn new(
        transport: Arc<dyn Transport>,
        base_url: impl Into<String>,
        variable: u32,
        locality_level: impl Into<String>,
    ) -> Self {
        Self {
            transport,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            variable,
            locality_level: locality_level.into(),
        }
    }

    /// Density of one municipality for `year`; NaN if the series has no
    /// value for that year.
    pub fn fetch_municipality(
        &self,
        municipality_id: &str,
        year: i32,
    ) -> std::result::Result<PopulationRecord, SkipReason> {
        let url = format!(
            "{}/periodos/{}/variaveis/{}?localidades={}[{}]",
            self.base_url, year, self.variable, self.locality_level, municipality_id
        );
        let body = classify_response(municipality_id, self.transport.get(&url, &[]))?;
        parse_aggregate_payload(municipality_id, year, &body)
    }

    /// Download a flat density table covering many municipalities at once,
    /// keeping the rows for `year`.
    pub fn fetch_bulk(
        &self,
        url: &str,
        year: i32,
    ) -> std::result::Result<Vec<PopulationRecord>, SkipReason> {
        let body = classify_response(url, self.transport.get(url, &[]))?;
        parse_bulk_table(&body, year)
    }
}

pub fn parse_aggregate_payload(
    municipality_id: &str,
    year: i32,
    body: &[u8],
) -> std::result::Result<PopulationRecord, SkipReason> {
    if is_blank(body) {
        return Err(SkipReason::EmptyPayload);
    }

    let document: Value = serde_json::from_slice(body).map_err(|_| SkipReason::MalformedPayload)?;
    let variables: Vec<AggregateVariable> =
        serde_json::from_value(document).map_err(|_| SkipReason::MalformedPayload)?;

    let serie = variables
        .into_iter()
        .next()
        .and_then(|v| v.resultados.into_iter().next())
        .and_then(|r| r.series.into_iter().next())
        .map(|s| s.serie)
        .ok_or(SkipReason::EmptyPayload)?;

    let density = match serie.get(&year.to_string()) {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(f64::NAN),
        Some(Value::String(s)) => coerce_numeric(s),
        _ => f64::NAN,
    };

    Ok(PopulationRecord::new(municipality_id, density))
}

/// Parse a flat CSV export (`,` or `;` separated, UTF-8 or Windows-1252).
///
/// Headers are normalized before lookup. The municipality identifier is
/// pulled out of the locality label; rows without one are dropped. When the
/// table has a year column only rows for `year` are kept, and a table with
/// no row for that year is an empty payload.
pub fn parse_bulk_table(
    body: &[u8],
    year: i32,
) -> std::result::Result<Vec<PopulationRecord>, SkipReason> {
    if is_blank(body) {
        return Err(SkipReason::EmptyPayload);
    }

    let text = match std::str::from_utf8(body) {
        Ok(text) => std::borrow::Cow::Borrowed(text),
        Err(_) => encoding_rs::WINDOWS_1252.decode(body).0,
    };

    let header_line = text.lines().next().unwrap_or_default();
    let delimiter = if header_line.matches(';').count() > header_line.matches(',').count() {
        b';'
    } else {
        b','
    };

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());

    let headers: Vec<String> = reader
        .headers()
        .map_err(|_| SkipReason::MalformedPayload)?
        .iter()
        .map(normalize_column_name)
        .collect();

    let find = |candidates: &[&str]| {
        candidates
            .iter()
            .find_map(|c| headers.iter().position(|h| h == c))
    };
    let label_idx = find(BULK_LOCALITY_COLUMNS).ok_or(SkipReason::MalformedPayload)?;
    let value_idx = find(BULK_VALUE_COLUMNS).ok_or(SkipReason::MalformedPayload)?;
    let year_idx = find(BULK_YEAR_COLUMNS);

    let mut records = Vec::new();
    let mut rows = 0usize;
    let mut labelled = 0usize;
    for result in reader.records() {
        let row = result.map_err(|_| SkipReason::MalformedPayload)?;
        rows += 1;

        let label = row.get(label_idx).unwrap_or_default();
        let Some(id) = extract_numeric_id(label) else {
            debug!(label, "no municipality identifier in locality label");
            continue;
        };
        labelled += 1;

        if let Some(idx) = year_idx {
            let row_year = row.get(idx).and_then(|v| v.trim().parse::<i32>().ok());
            if row_year != Some(year) {
                continue;
            }
        }

        let value = row.get(value_idx).map(coerce_numeric).unwrap_or(f64::NAN);
        records.push(PopulationRecord::new(id, value));
    }

    if rows == 0 {
        return Err(SkipReason::EmptyPayload);
    }
    if labelled == 0 {
        return Err(SkipReason::MalformedPayload);
    }
    if records.is_empty() {
        debug!(year, "bulk table has no rows for the requested year");
        return Err(SkipReason::EmptyPayload);
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::{RawResponse, TransportError};
    use std::sync::Mutex;

    struct FixedTransport {
        response: std::result::Result<RawResponse, TransportError>,
        urls: Mutex<Vec<String>>,
    }

    impl Transport for FixedTransport {
        fn get(
            &self,
            url: &str,
            _query: &[(&str, String)],
        ) -> std::result::Result<RawResponse, TransportError> {
            self.urls.lock().unwrap().push(url.to_string());
            self.response.clone()
        }
    }

    const AGGREGATE_BODY: &str = r#"[{
        "id": "9324",
        "variavel": "Densidade demográfica",
        "resultados": [{
            "classificacoes": [],
            "series": [{
                "localidade": {"id": "33", "nome": "Rio de Janeiro"},
                "serie": {"2021": "366.97", "2022": "..."}
            }]
        }]
    }]"#;

    #[test]
    fn test_fetch_municipality_url_and_value() {
        let transport = Arc::new(FixedTransport {
            response: Ok(RawResponse::new(200, AGGREGATE_BODY)),
            urls: Mutex::new(Vec::new()),
        });
        let client = PopulationClient::new(
            transport.clone(),
            "https://example.test/agregados/6579",
            9324,
            "N3",
        );

        let record = client.fetch_municipality("33", 2021).unwrap();
        assert_eq!(record.municipality_id, "33");
        assert_eq!(record.pop_density, 366.97);

        assert_eq!(
            transport.urls.lock().unwrap()[0],
            "https://example.test/agregados/6579/periodos/2021/variaveis/9324?localidades=N3[33]"
        );
    }

    #[test]
    fn test_missing_year_is_nan() {
        let record = parse_aggregate_payload("33", 2019, AGGREGATE_BODY.as_bytes()).unwrap();
        assert!(record.pop_density.is_nan());

        let record = parse_aggregate_payload("33", 2022, AGGREGATE_BODY.as_bytes()).unwrap();
        assert!(record.pop_density.is_nan());
    }

    #[test]
    fn test_aggregate_failures() {
        assert_eq!(
            parse_aggregate_payload("33", 2021, b"[]"),
            Err(SkipReason::EmptyPayload)
        );
        assert_eq!(
            parse_aggregate_payload("33", 2021, br#"[{"id": "9324"}]"#),
            Err(SkipReason::EmptyPayload)
        );
        assert_eq!(
            parse_aggregate_payload("33", 2021, b"not json"),
            Err(SkipReason::MalformedPayload)
        );
        assert_eq!(
            parse_aggregate_payload("33", 2021, br#"{"resultados": []}"#),
            Err(SkipReason::MalformedPayload)
        );
    }

    #[test]
    fn test_status_before_body() {
        let transport = Arc::new(FixedTransport {
            response: Ok(RawResponse::new(404, "not json at all")),
            urls: Mutex::new(Vec::new()),
        });
        let client = PopulationClient::new(transport, "https://example.test", 1, "N6");
        assert_eq!(
            client.fetch_municipality("1", 2021),
            Err(SkipReason::HttpStatus(404))
        );
    }

    #[test]
    fn test_parse_bulk_table() {
        let body = "Nível Territorial;Município;Ano;Valor\n\
                    Município;Abadia de Goiás (GO) [5200050];2021;56,07\n\
                    Município;Abadiânia (GO) [5200100];2021;...\n\
                    Total;Brasil;2021;25.06\n";

        let records = parse_bulk_table(body.as_bytes(), 2021).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0], PopulationRecord::new("5200050", 56.07));
        assert_eq!(records[1].municipality_id, "5200100");
        assert!(records[1].pop_density.is_nan());
    }

    #[test]
    fn test_parse_bulk_table_windows_1252() {
        // "Município" with a Latin-1 encoded 'í'
        let mut body = b"Munic\xedpio,Valor\n".to_vec();
        body.extend_from_slice(b"3550308 - Sao Paulo,8005.2\n");

        let records = parse_bulk_table(&body, 2022).unwrap();
        assert_eq!(records, vec![PopulationRecord::new("3550308", 8005.2)]);
    }

    #[test]
    fn test_parse_bulk_table_keeps_requested_year() {
        let body = "Município;Ano;Valor
                    Rio (RJ) [3304557];2021;100
                    Rio (RJ) [3304557];2022;200
                    Niterói (RJ) [3303302];2021;50
";

        assert_eq!(
            parse_bulk_table(body.as_bytes(), 2022).unwrap(),
            vec![PopulationRecord::new("3304557", 200.0)]
        );
        assert_eq!(
            parse_bulk_table(body.as_bytes(), 2021).unwrap(),
            vec![
                PopulationRecord::new("3304557", 100.0),
                PopulationRecord::new("3303302", 50.0),
            ]
        );
        assert_eq!(
            parse_bulk_table(body.as_bytes(), 2023),
            Err(SkipReason::EmptyPayload)
        );
    }

    #[test]
    fn test_parse_bulk_table_failures() {
        assert_eq!(parse_bulk_table(b"", 2021), Err(SkipReason::EmptyPayload));
        assert_eq!(
            parse_bulk_table(b"localidade,valor\n", 2021),
            Err(SkipReason::EmptyPayload)
        );
        assert_eq!(
            parse_bulk_table(b"name,count\nx,1\n", 2021),
            Err(SkipReason::MalformedPayload)
        );
        assert_eq!(
            parse_bulk_table(b"localidade,valor\nBrasil,25.0\n", 2021),
            Err(SkipReason::MalformedPayload)
        );
    }
}
