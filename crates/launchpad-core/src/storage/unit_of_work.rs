//! Atomic groups of local writes

use uuid::Uuid;

use crate::types::{App, Build, Localization, TenantRecord, Version};

/// A single write applied as part of a [`UnitOfWork`]
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOp {
    /// Insert or replace a tenant
    PutTenant(TenantRecord),
    /// Insert or replace an app by id
    PutApp(App),
    /// Insert or replace a version by id
    PutVersion(Version),
    /// Drop every localization of the version, then insert `rows`
    ReplaceLocalizations {
        version_id: Uuid,
        rows: Vec<Localization>,
    },
    /// Insert or replace a build by id
    PutBuild(Build),
    /// Mark one build selected and unselect every other build of the version
    SelectBuild { version_id: Uuid, build_id: Uuid },
    /// Unselect every build of the version
    ClearBuildSelection { version_id: Uuid },
    /// Record the remote fingerprint last written for an app
    SetFingerprint { app_id: Uuid, fingerprint: String },
}

impl WriteOp {
    /// Short name for logs
    pub fn name(&self) -> &'static str {
        match self {
            WriteOp::PutTenant(_) => "put_tenant",
            WriteOp::PutApp(_) => "put_app",
            WriteOp::PutVersion(_) => "put_version",
            WriteOp::ReplaceLocalizations { .. } => "replace_localizations",
            WriteOp::PutBuild(_) => "put_build",
            WriteOp::SelectBuild { .. } => "select_build",
            WriteOp::ClearBuildSelection { .. } => "clear_build_selection",
            WriteOp::SetFingerprint { .. } => "set_fingerprint",
        }
    }
}

/// Ordered writes that either all land or none do
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UnitOfWork {
    ops: Vec<WriteOp>,
}

impl UnitOfWork {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an operation
    pub fn push(&mut self, op: WriteOp) {
        self.ops.push(op);
    }

    /// Builder form of [`UnitOfWork::push`]
    pub fn with(mut self, op: WriteOp) -> Self {
        self.ops.push(op);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn ops(&self) -> &[WriteOp] {
        &self.ops
    }
}
