mod api;
mod identity;

pub use api::{
    BootstrapStatusResponse, HealthResponse, MeResponse, SyncKeyRequest, SyncKeyResponse,
    WhoAmIResponse,
};
pub use identity::{AdmissionPath, Caller, UserClaims};
