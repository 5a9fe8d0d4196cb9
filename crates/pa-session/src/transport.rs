//! The externally-owned REST client (§1, §6). This crate never performs
//! network I/O itself — the facade calls through this trait and re-enters
//! the locked `Session` with the result.

use async_trait::async_trait;

use pa_proto::wire::{
    ActivationCreateRequest, ActivationCreateResponse, ActivationRemoveResponse,
    ActivationStatusResponse, VaultUnlockResponse,
};

use crate::error::PowerAuthError;

#[async_trait]
pub trait PowerAuthTransport: Send + Sync {
    async fn activation_create(
        &self,
        request: ActivationCreateRequest,
    ) -> Result<ActivationCreateResponse, PowerAuthError>;

    async fn activation_status(
        &self,
        activation_id: &str,
    ) -> Result<ActivationStatusResponse, PowerAuthError>;

    /// `authorization_header` is the pre-built `X-PowerAuth-Authorization`
    /// value for this signed, empty-body request.
    async fn vault_unlock(
        &self,
        authorization_header: &str,
    ) -> Result<VaultUnlockResponse, PowerAuthError>;

    async fn activation_remove(
        &self,
        authorization_header: &str,
    ) -> Result<ActivationRemoveResponse, PowerAuthError>;
}
