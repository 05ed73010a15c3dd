// In-memory management client.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{Map, Value};
use std::collections::HashMap;

use crate::cim::{CimError, ManagementClient, MethodResult, Operator, Query, Record};

/// One recorded method invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    pub class: String,
    pub method: String,
    pub params: Map<String, Value>,
}

#[derive(Default)]
struct State {
    instances: Vec<Record>,
    associated: HashMap<(String, String), Vec<Record>>,
    results: HashMap<(String, String), u32>,
    failures: HashMap<String, String>,
    queried: Vec<String>,
    calls: Vec<Call>,
}

/// FakeClient answers queries from a fixed set of records. Filters compare
/// case-insensitively; an empty answer is `NotFound`, like the real client.
#[derive(Default)]
pub struct FakeClient {
    state: Mutex<State>,
}

impl FakeClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_instances(self, records: impl IntoIterator<Item = Record>) -> Self {
        self.state.lock().instances.extend(records);
        self
    }

    /// Records returned by `ASSOCIATORS OF` the instance whose first filter value is `source`.
    pub fn with_associated(self, association: &str, source: &str, records: impl IntoIterator<Item = Record>) -> Self {
        self.state
            .lock()
            .associated
            .entry((association.to_uppercase(), source.to_uppercase()))
            .or_default()
            .extend(records);
        self
    }

    pub fn with_method_result(self, class: &str, method: &str, return_value: u32) -> Self {
        self.state
            .lock()
            .results
            .insert((class.to_uppercase(), method.to_uppercase()), return_value);
        self
    }

    /// Makes every query and invocation on `class` fail.
    pub fn with_failure(self, class: &str, reason: &str) -> Self {
        self.state.lock().failures.insert(class.to_uppercase(), reason.to_string());
        self
    }

    pub fn add_instance(&self, record: Record) {
        self.state.lock().instances.push(record);
    }

    /// Classes queried so far, in order.
    pub fn queried(&self) -> Vec<String> {
        self.state.lock().queried.clone()
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().calls.clone()
    }

    fn matches(record: &Record, query: &Query) -> bool {
        record.class().eq_ignore_ascii_case(query.class())
            && query.filters().iter().all(|f| {
                let equal = record
                    .string(&f.property)
                    .map(|v| v.eq_ignore_ascii_case(&f.value))
                    .unwrap_or(false);
                match f.op {
                    Operator::Equals => equal,
                    Operator::NotEquals => !equal,
                }
            })
    }

    fn check_failure(state: &State, class: &str, what: String) -> Result<(), CimError> {
        match state.failures.get(&class.to_uppercase()) {
            Some(reason) => Err(CimError::Query {
                query: what,
                reason: reason.clone(),
            }),
            None => Ok(()),
        }
    }

    fn not_found(query: &Query) -> CimError {
        CimError::NotFound {
            namespace: query.namespace().to_string(),
            query: query.to_wql(),
        }
    }
}

#[async_trait]
impl ManagementClient for FakeClient {
    async fn query_instances(&self, query: &Query) -> Result<Vec<Record>, CimError> {
        let mut state = self.state.lock();
        state.queried.push(query.class().to_string());
        Self::check_failure(&state, query.class(), query.to_wql())?;

        let found: Vec<Record> = state
            .instances
            .iter()
            .filter(|r| Self::matches(r, query))
            .cloned()
            .collect();
        if found.is_empty() {
            return Err(Self::not_found(query));
        }
        Ok(found)
    }

    async fn query_associated(&self, source: &Query, association: &str, role: &str) -> Result<Vec<Record>, CimError> {
        let mut state = self.state.lock();
        state.queried.push(association.to_string());
        Self::check_failure(&state, association, source.associators_wql(association, role))?;

        let key = source.filters().first().map(|f| f.value.to_uppercase()).unwrap_or_default();
        match state.associated.get(&(association.to_uppercase(), key)) {
            Some(records) if !records.is_empty() => Ok(records.clone()),
            _ => Err(CimError::NotFound {
                namespace: source.namespace().to_string(),
                query: source.associators_wql(association, role),
            }),
        }
    }

    async fn invoke_class_method(
        &self,
        _namespace: &str,
        class: &str,
        method: &str,
        params: Map<String, Value>,
    ) -> Result<MethodResult, CimError> {
        let mut state = self.state.lock();
        Self::check_failure(&state, class, format!("{}.{}", class, method))?;
        state.calls.push(Call {
            class: class.to_string(),
            method: method.to_string(),
            params,
        });

        let return_value = state
            .results
            .get(&(class.to_uppercase(), method.to_uppercase()))
            .copied()
            .unwrap_or(0);
        Ok(MethodResult {
            return_value,
            out_params: Map::new(),
        })
    }

    async fn invoke_instance_method(
        &self,
        target: &Query,
        method: &str,
        params: Map<String, Value>,
    ) -> Result<MethodResult, CimError> {
        let mut state = self.state.lock();
        Self::check_failure(&state, target.class(), format!("{}.{}", target.class(), method))?;
        if !state.instances.iter().any(|r| Self::matches(r, target)) {
            return Err(Self::not_found(target));
        }
        state.calls.push(Call {
            class: target.class().to_string(),
            method: method.to_string(),
            params,
        });

        let return_value = state
            .results
            .get(&(target.class().to_uppercase(), method.to_uppercase()))
            .copied()
            .unwrap_or(0);
        Ok(MethodResult {
            return_value,
            out_params: Map::new(),
        })
    }
}
