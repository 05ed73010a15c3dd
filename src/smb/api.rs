// SMB global mappings and symbolic links.

use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::info;

use crate::cim::{ignore_not_found, CimError, ManagementClient, Query, NAMESPACE_SMB};
use crate::powershell::{ScriptRunner, ShellError};

pub const GLOBAL_MAPPING_CLASS: &str = "MSFT_SmbGlobalMapping";

const NEW_GLOBAL_MAPPING_SCRIPT: &str = "$PWord = ConvertTo-SecureString -String $Env:smbpassword -AsPlainText -Force\
;$Credential = New-Object -TypeName System.Management.Automation.PSCredential -ArgumentList $Env:smbuser, $PWord\
;New-SmbGlobalMapping -RemotePath $Env:smbremotepath -Credential $Credential -RequirePrivacy $true";

const NEW_LINK_SCRIPT: &str = "New-Item -ItemType SymbolicLink $Env:smblocalpath -Target $Env:smbremotepath";

#[derive(Debug, thiserror::Error)]
pub enum SmbError {
    #[error("new smb global mapping for {remote_path} failed: {source}")]
    GlobalMapping {
        remote_path: String,
        #[source]
        source: ShellError,
    },
    #[error("linking {remote_path} to {local_path} failed: {source}")]
    Link {
        remote_path: String,
        local_path: String,
        #[source]
        source: ShellError,
    },
    #[error("removing smb mapping {remote_path} failed: {source}")]
    Remove {
        remote_path: String,
        #[source]
        source: CimError,
    },
    #[error("removing smb mapping {remote_path} was refused, result: {result}")]
    RemoveRefused { remote_path: String, result: u32 },
    #[error(transparent)]
    Cim(#[from] CimError),
}

impl SmbError {
    pub fn is_not_found(&self) -> bool {
        match self {
            SmbError::Cim(e) | SmbError::Remove { source: e, .. } => e.is_not_found(),
            _ => false,
        }
    }
}

/// SmbApi implements the smb API group.
pub struct SmbApi {
    client: Arc<dyn ManagementClient>,
    shell: Arc<dyn ScriptRunner>,
}

impl SmbApi {
    pub fn new(client: Arc<dyn ManagementClient>, shell: Arc<dyn ScriptRunner>) -> Self {
        Self { client, shell }
    }

    fn by_remote_path(remote_path: &str) -> Query {
        Query::new(NAMESPACE_SMB, GLOBAL_MAPPING_CLASS).filter("RemotePath", remote_path)
    }

    /// Reports whether a global mapping to `remote_path` exists.
    pub async fn is_smb_mapped(&self, remote_path: &str) -> Result<bool, SmbError> {
        let found = ignore_not_found(self.client.query_instances(&Self::by_remote_path(remote_path)).await)?;
        Ok(!found.is_empty())
    }

    /// Creates a global mapping with privacy required. Credentials only travel through the
    /// script environment.
    pub async fn new_smb_global_mapping(&self, remote_path: &str, username: &str, password: &str) -> Result<(), SmbError> {
        self.shell
            .run(
                NEW_GLOBAL_MAPPING_SCRIPT,
                &[
                    ("smbuser", username),
                    ("smbpassword", password),
                    ("smbremotepath", remote_path),
                ],
            )
            .await
            .map_err(|source| SmbError::GlobalMapping {
                remote_path: remote_path.to_string(),
                source,
            })?;

        info!(component = "smb", event = "mapping_created", remote_path = remote_path, "smb global mapping created");
        Ok(())
    }

    pub async fn remove_smb_global_mapping(&self, remote_path: &str) -> Result<(), SmbError> {
        let mut params = Map::new();
        params.insert("Force".into(), Value::Bool(true));

        let result = self
            .client
            .invoke_instance_method(&Self::by_remote_path(remote_path), "Remove", params)
            .await
            .map_err(|source| SmbError::Remove {
                remote_path: remote_path.to_string(),
                source,
            })?;
        if result.return_value != 0 {
            return Err(SmbError::RemoveRefused {
                remote_path: remote_path.to_string(),
                result: result.return_value,
            });
        }

        info!(component = "smb", event = "mapping_removed", remote_path = remote_path, "smb global mapping removed");
        Ok(())
    }

    /// Creates a directory symbolic link at `local_path` pointing to the share.
    pub async fn new_smb_link(&self, remote_path: &str, local_path: &str) -> Result<(), SmbError> {
        let mut target = remote_path.to_string();
        if !target.ends_with('\\') {
            target.push('\\');
        }

        self.shell
            .run(NEW_LINK_SCRIPT, &[("smbremotepath", target.as_str()), ("smblocalpath", local_path)])
            .await
            .map_err(|source| SmbError::Link {
                remote_path: target.clone(),
                local_path: local_path.to_string(),
                source,
            })?;

        Ok(())
    }
}
