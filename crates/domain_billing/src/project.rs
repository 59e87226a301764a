//! Client projects as seen by billing
//!
//! Clients and projects are managed elsewhere; billing only needs the live
//! client profile of a project to take the snapshot at invoice creation.

use serde::{Deserialize, Serialize};

use core_kernel::{ClientId, ProjectId};

/// Live contact details of a client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientProfile {
    pub id: ClientId,
    pub full_name: String,
    pub address: String,
    pub phone: String,
}

/// A client project that invoices are attached to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub id: ProjectId,
    pub name: String,
    pub client_id: ClientId,
}

/// A project together with its client's current profile
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectContext {
    pub project: Project,
    pub client: ClientProfile,
}
