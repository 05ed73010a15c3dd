//! ManagementClient backed by the PowerShell CIM cmdlets.

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::debug;

use super::client::{CimError, ManagementClient, MethodResult};
use super::query::Query;
use super::record::Record;
use crate::powershell::ScriptRunner;

const CLASS_PROPERTY: &str = "__CLASS";
const RETURN_VALUE_PROPERTY: &str = "ReturnValue";

const QUERY_SCRIPT: &str = r#"$ErrorActionPreference = 'Stop'
$props = @($env:CIM_SELECT -split ',') + @(@{ n = '__CLASS'; e = { $_.CimSystemProperties.ClassName } })
$items = @(Get-CimInstance -Namespace $env:CIM_NAMESPACE -Query $env:CIM_QUERY |
    Select-Object -Property $props -ExcludeProperty CimClass,CimInstanceProperties,CimSystemProperties,PSComputerName)
ConvertTo-Json -InputObject $items -Depth 4 -Compress"#;

const CLASS_METHOD_SCRIPT: &str = r#"$ErrorActionPreference = 'Stop'
$arguments = @{}
if ($env:CIM_ARGS) { ($env:CIM_ARGS | ConvertFrom-Json).psobject.Properties | ForEach-Object { $arguments[$_.Name] = $_.Value } }
$results = @(Invoke-CimMethod -Namespace $env:CIM_NAMESPACE -ClassName $env:CIM_CLASS -MethodName $env:CIM_METHOD -Arguments $arguments |
    Select-Object -Property * -ExcludeProperty CimClass,CimInstanceProperties,CimSystemProperties,PSComputerName)
ConvertTo-Json -InputObject $results -Depth 4 -Compress"#;

const INSTANCE_METHOD_SCRIPT: &str = r#"$ErrorActionPreference = 'Stop'
$arguments = @{}
if ($env:CIM_ARGS) { ($env:CIM_ARGS | ConvertFrom-Json).psobject.Properties | ForEach-Object { $arguments[$_.Name] = $_.Value } }
$results = @(Get-CimInstance -Namespace $env:CIM_NAMESPACE -Query $env:CIM_QUERY |
    Invoke-CimMethod -MethodName $env:CIM_METHOD -Arguments $arguments |
    Select-Object -Property * -ExcludeProperty CimClass,CimInstanceProperties,CimSystemProperties,PSComputerName)
ConvertTo-Json -InputObject $results -Depth 4 -Compress"#;

/// PowerShellClient drives `Get-CimInstance` / `Invoke-CimMethod` and decodes their JSON output.
pub struct PowerShellClient {
    shell: Arc<dyn ScriptRunner>,
}

impl PowerShellClient {
    pub fn new(shell: Arc<dyn ScriptRunner>) -> Self {
        Self { shell }
    }

    async fn run_query(&self, namespace: &str, class: &str, wql: &str, selectors: &[String]) -> Result<Vec<Record>, CimError> {
        let select = if selectors.is_empty() {
            "*".to_string()
        } else {
            selectors.join(",")
        };

        debug!(component = "cim", event = "query", namespace = namespace, query = wql, "querying instances");

        let out = self
            .shell
            .run(
                QUERY_SCRIPT,
                &[
                    ("CIM_NAMESPACE", namespace),
                    ("CIM_QUERY", wql),
                    ("CIM_SELECT", select.as_str()),
                ],
            )
            .await
            .map_err(|e| CimError::Query {
                query: wql.to_string(),
                reason: e.to_string(),
            })?;

        let rows = decode_rows(&out, wql)?;
        if rows.is_empty() {
            return Err(CimError::NotFound {
                namespace: namespace.to_string(),
                query: wql.to_string(),
            });
        }

        Ok(rows
            .into_iter()
            .map(|mut row| {
                let row_class = match row.remove(CLASS_PROPERTY) {
                    Some(Value::String(c)) if !c.is_empty() => c,
                    _ => class.to_string(),
                };
                Record::from_properties(namespace, row_class, row)
            })
            .collect())
    }

    fn method_result(class: &str, method: &str, rows: Vec<Map<String, Value>>) -> Result<MethodResult, CimError> {
        let mut results = Vec::with_capacity(rows.len());
        for mut row in rows {
            let return_value = match row.remove(RETURN_VALUE_PROPERTY) {
                Some(Value::Number(n)) => n.as_u64().and_then(|v| u32::try_from(v).ok()).ok_or_else(|| {
                    CimError::Method {
                        class: class.to_string(),
                        method: method.to_string(),
                        reason: format!("unexpected return value {}", n),
                    }
                })?,
                Some(Value::Null) | None => 0,
                Some(other) => {
                    return Err(CimError::Method {
                        class: class.to_string(),
                        method: method.to_string(),
                        reason: format!("unexpected return value {}", other),
                    })
                }
            };
            results.push(MethodResult {
                return_value,
                out_params: row,
            });
        }

        // The first failing invocation wins when several instances were targeted.
        let pos = results.iter().position(|r| r.return_value != 0).unwrap_or(0);
        Ok(results.into_iter().nth(pos).unwrap_or_default())
    }
}

fn decode_rows(out: &str, what: &str) -> Result<Vec<Map<String, Value>>, CimError> {
    let trimmed = out.trim();
    if trimmed.is_empty() || trimmed == "null" {
        return Ok(Vec::new());
    }
    let value: Value = serde_json::from_str(trimmed).map_err(|source| CimError::Decode {
        what: what.to_string(),
        source,
    })?;
    match value {
        Value::Array(items) => Ok(items
            .into_iter()
            .filter_map(|item| match item {
                Value::Object(map) => Some(map),
                _ => None,
            })
            .collect()),
        Value::Object(map) => Ok(vec![map]),
        _ => Ok(Vec::new()),
    }
}

fn encode_params(params: &Map<String, Value>) -> String {
    Value::Object(params.clone()).to_string()
}

#[async_trait]
impl ManagementClient for PowerShellClient {
    async fn query_instances(&self, query: &Query) -> Result<Vec<Record>, CimError> {
        self.run_query(query.namespace(), query.class(), &query.to_wql(), query.selectors())
            .await
    }

    async fn query_associated(
        &self,
        source: &Query,
        association: &str,
        role: &str,
    ) -> Result<Vec<Record>, CimError> {
        let wql = source.associators_wql(association, role);
        self.run_query(source.namespace(), association, &wql, &[]).await
    }

    async fn invoke_class_method(
        &self,
        namespace: &str,
        class: &str,
        method: &str,
        params: Map<String, Value>,
    ) -> Result<MethodResult, CimError> {
        let args = encode_params(&params);
        debug!(component = "cim", event = "invoke", class = class, method = method, "invoking class method");

        let out = self
            .shell
            .run(
                CLASS_METHOD_SCRIPT,
                &[
                    ("CIM_NAMESPACE", namespace),
                    ("CIM_CLASS", class),
                    ("CIM_METHOD", method),
                    ("CIM_ARGS", args.as_str()),
                ],
            )
            .await
            .map_err(|e| CimError::Method {
                class: class.to_string(),
                method: method.to_string(),
                reason: e.to_string(),
            })?;

        let rows = decode_rows(&out, method)?;
        Self::method_result(class, method, rows)
    }

    async fn invoke_instance_method(
        &self,
        target: &Query,
        method: &str,
        params: Map<String, Value>,
    ) -> Result<MethodResult, CimError> {
        let args = encode_params(&params);
        let wql = target.to_wql();
        debug!(component = "cim", event = "invoke", query = %wql, method = method, "invoking instance method");

        let out = self
            .shell
            .run(
                INSTANCE_METHOD_SCRIPT,
                &[
                    ("CIM_NAMESPACE", target.namespace()),
                    ("CIM_QUERY", wql.as_str()),
                    ("CIM_METHOD", method),
                    ("CIM_ARGS", args.as_str()),
                ],
            )
            .await
            .map_err(|e| CimError::Method {
                class: target.class().to_string(),
                method: method.to_string(),
                reason: e.to_string(),
            })?;

        let rows = decode_rows(&out, method)?;
        if rows.is_empty() {
            return Err(CimError::NotFound {
                namespace: target.namespace().to_string(),
                query: wql,
            });
        }
        Self::method_result(target.class(), method, rows)
    }
}
