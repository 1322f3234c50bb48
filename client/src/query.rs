use std::fmt::Display;

/// Filters and output options for the anonymizers feed.
///
/// Optional filters are omitted from the request when unset. An empty string
/// is treated the same as unset. `full`, `format` and `order` are always sent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnonymizersQuery {
    /// Feed source, e.g. `BIRDPROXIES`.
    pub provider: Option<String>,
    /// Anonymizer category, e.g. `RESIDENTIAL_PROXY`. Sent as `type`.
    pub anonymizer_type: Option<String>,
    /// Recency window for the last sighting, e.g. `7D`.
    pub last_observed: Option<String>,
    /// ISO 3166-1 alpha-2 country code.
    pub country_code: Option<String>,
    /// Output format, e.g. `CSV`.
    pub format: String,
    /// Request the full dataset.
    pub full: bool,
    /// Sort order, e.g. `desc`.
    pub order: String,
}

impl AnonymizersQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn provider<S: Into<String>>(mut self, provider: S) -> Self {
        self.provider = Some(provider.into());
        self
    }

    pub fn anonymizer_type<S: Into<String>>(mut self, anonymizer_type: S) -> Self {
        self.anonymizer_type = Some(anonymizer_type.into());
        self
    }

    pub fn last_observed<S: Into<String>>(mut self, last_observed: S) -> Self {
        self.last_observed = Some(last_observed.into());
        self
    }

    pub fn country_code<S: Into<String>>(mut self, country_code: S) -> Self {
        self.country_code = Some(country_code.into());
        self
    }

    pub fn format<S: Into<String>>(mut self, format: S) -> Self {
        self.format = format.into();
        self
    }

    pub fn full(mut self, full: bool) -> Self {
        self.full = full;
        self
    }

    pub fn order<S: Into<String>>(mut self, order: S) -> Self {
        self.order = order.into();
        self
    }

    /// The (key, value) pairs sent to the feed, in wire order.
    pub fn to_params(&self) -> Vec<(&'static str, String)> {
        let mut params = Vec::with_capacity(7);
        let optional = [
            ("provider", &self.provider),
            ("type", &self.anonymizer_type),
            ("last_observed", &self.last_observed),
            ("country_code", &self.country_code),
        ];
        for (key, value) in optional {
            if let Some(value) = value.as_deref().filter(|v| !v.is_empty()) {
                params.push((key, value.to_string()));
            }
        }
        params.push(("full", self.full.to_string()));
        params.push(("format", self.format.clone()));
        params.push(("order", self.order.clone()));
        params
    }

    /// Percent-encoded query string, without the leading `?`.
    pub fn to_query_string(&self) -> String {
        self.to_params()
            .iter()
            .map(|(key, value)| format!("{}={}", key, urlencoding::encode(value)))
            .collect::<Vec<_>>()
            .join("&")
    }
}

impl Display for AnonymizersQuery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_query_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys(query: &AnonymizersQuery) -> Vec<&'static str> {
        query.to_params().into_iter().map(|(key, _)| key).collect()
    }

    #[test]
    fn test_empty_query_sends_only_required_params() {
        let query = AnonymizersQuery::new();
        assert_eq!(query.to_query_string(), "full=false&format=&order=");
    }

    #[test]
    fn test_full_query() {
        let query = AnonymizersQuery::new()
            .provider("BIRDPROXIES")
            .anonymizer_type("RESIDENTIAL_PROXY")
            .last_observed("7D")
            .country_code("US")
            .format("CSV")
            .full(true)
            .order("desc");
        assert_eq!(
            query.to_query_string(),
            "provider=BIRDPROXIES&type=RESIDENTIAL_PROXY&last_observed=7D&country_code=US&full=true&format=CSV&order=desc"
        );
    }

    #[test]
    fn test_unset_fields_are_omitted() {
        let query = AnonymizersQuery::new().provider("BIRDPROXIES").country_code("DE");
        assert_eq!(
            keys(&query),
            vec!["provider", "country_code", "full", "format", "order"]
        );
    }

    #[test]
    fn test_empty_string_is_unset() {
        let query = AnonymizersQuery::new().provider("").last_observed("30D");
        assert_eq!(keys(&query), vec!["last_observed", "full", "format", "order"]);
    }

    #[test]
    fn test_full_flag_text() {
        let on = AnonymizersQuery::new().full(true).to_params();
        assert!(on.contains(&("full", "true".to_string())));

        let off = AnonymizersQuery::new().full(false).to_params();
        assert!(off.contains(&("full", "false".to_string())));
    }

    #[test]
    fn test_values_are_percent_encoded() {
        let query = AnonymizersQuery::new().provider("A&B C");
        assert!(query.to_query_string().starts_with("provider=A%26B%20C&"));
    }

    #[test]
    fn test_display_trait() {
        let query = AnonymizersQuery::new().format("CSV");
        assert_eq!(format!("{}", query), "full=false&format=CSV&order=");
    }
}
