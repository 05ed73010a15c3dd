//! WQL query construction.

/// Comparison operator of a query filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Equals,
    NotEquals,
}

impl Operator {
    fn as_wql(&self) -> &'static str {
        match self {
            Operator::Equals => "=",
            Operator::NotEquals => "<>",
        }
    }
}

/// Filter narrows a query down by one property.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filter {
    pub property: String,
    pub value: String,
    pub op: Operator,
}

impl Filter {
    pub fn new(property: impl Into<String>, value: impl Into<String>, op: Operator) -> Self {
        Self {
            property: property.into(),
            value: value.into(),
            op,
        }
    }

    pub fn equals(property: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new(property, value, Operator::Equals)
    }

    fn to_wql(&self) -> String {
        format!("{} {} '{}'", self.property, self.op.as_wql(), escape(&self.value))
    }
}

/// Query selects instances of one class in one namespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    namespace: String,
    class: String,
    selectors: Vec<String>,
    filters: Vec<Filter>,
}

impl Query {
    pub fn new(namespace: impl Into<String>, class: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            class: class.into(),
            selectors: Vec::new(),
            filters: Vec::new(),
        }
    }

    /// Restricts the returned properties. An empty list selects everything.
    pub fn select<I, S>(mut self, selectors: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.selectors.extend(selectors.into_iter().map(Into::into));
        self
    }

    /// Adds an equality filter.
    pub fn filter(mut self, property: impl Into<String>, value: impl Into<String>) -> Self {
        self.filters.push(Filter::equals(property, value));
        self
    }

    pub fn with_filters(mut self, filters: impl IntoIterator<Item = Filter>) -> Self {
        self.filters.extend(filters);
        self
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn class(&self) -> &str {
        &self.class
    }

    pub fn selectors(&self) -> &[String] {
        &self.selectors
    }

    pub fn filters(&self) -> &[Filter] {
        &self.filters
    }

    /// Renders the query as WQL.
    pub fn to_wql(&self) -> String {
        let selected = if self.selectors.is_empty() {
            "*".to_string()
        } else {
            self.selectors.join(",")
        };

        let mut wql = format!("SELECT {} FROM {}", selected, self.class);
        if !self.filters.is_empty() {
            let conditions: Vec<String> = self.filters.iter().map(Filter::to_wql).collect();
            wql.push_str(" WHERE ");
            wql.push_str(&conditions.join(" AND "));
        }
        wql
    }

    /// Object path of the single instance this query identifies through its equality filters,
    /// e.g. `Win32_Service.Name='csiproxy'`.
    pub fn object_path(&self) -> String {
        let keys: Vec<String> = self
            .filters
            .iter()
            .filter(|f| f.op == Operator::Equals)
            .map(|f| format!("{}='{}'", f.property, escape(&f.value)))
            .collect();
        if keys.is_empty() {
            self.class.clone()
        } else {
            format!("{}.{}", self.class, keys.join(","))
        }
    }

    /// Renders an `ASSOCIATORS OF` query for the instance identified by this query.
    pub fn associators_wql(&self, association: &str, role: &str) -> String {
        let mut wql = format!(
            "ASSOCIATORS OF {{{}}} WHERE AssocClass = {}",
            self.object_path(),
            association
        );
        if !role.is_empty() {
            wql.push_str(&format!(" Role = {}", role));
        }
        wql
    }
}

/// Escapes a string literal for WQL.
pub fn escape(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}
