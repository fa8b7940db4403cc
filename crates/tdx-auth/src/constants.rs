//! TDX endpoint defaults
//!
//! Public endpoints of the Taiwan Transport Data eXchange. The application
//! identity (client id + secret) comes from configuration, never from here.

/// OpenID Connect token endpoint for the client-credentials grant
pub const TOKEN_ENDPOINT: &str =
    "https://tdx.transportdata.tw/auth/realms/TDXConnect/protocol/openid-connect/token";

/// OAuth grant type used for the application identity
pub const GRANT_TYPE: &str = "client_credentials";

/// Token lifetime assumed when the token endpoint omits `expires_in`
pub const DEFAULT_EXPIRES_IN_SECS: u64 = 3600;

/// Subtracted from the token lifetime so a token is renewed before the
/// server considers it expired (clock skew, request latency).
pub const DEFAULT_SAFETY_MARGIN_SECS: u64 = 60;
