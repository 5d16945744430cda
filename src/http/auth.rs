//! Identity supplied by the external wallet/auth service.
//!
//! Tokens are minted elsewhere; this server only validates them. Claims
//! carry the authenticated player id plus the wallet service's verified
//! per-collection NFT holding counts, which the join path uses for
//! collection-gate eligibility.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Player UUID.
    pub sub: String,
    /// Verified holdings: collection id -> qualifying NFT count.
    #[serde(default)]
    pub holdings: HashMap<String, u32>,
    pub exp: usize,
}

pub mod extractor {
    use super::Claims;
    use actix_web::{
        dev::Payload, error::ErrorUnauthorized, FromRequest, HttpRequest, Result as ActixResult,
    };
    use futures_util::future::{ready, Ready};
    use jsonwebtoken::{decode, DecodingKey, Validation};
    use std::collections::HashMap;
    use std::env;
    use uuid::Uuid;

    /// Extracts and validates a Bearer-JWT, exposing the player UUID and
    /// verified collection holdings.
    #[derive(Debug, Clone)]
    pub struct JwtAuth {
        pub player_id: Uuid,
        pub holdings: HashMap<String, u32>,
    }

    impl FromRequest for JwtAuth {
        type Error = actix_web::Error;
        type Future = Ready<ActixResult<Self, Self::Error>>;

        fn from_request(req: &HttpRequest, _pl: &mut Payload) -> Self::Future {
            let res = (|| {
                // Expect:  Authorization: Bearer <JWT>
                let hdr = req
                    .headers()
                    .get("Authorization")
                    .and_then(|v| v.to_str().ok())
                    .ok_or_else(|| ErrorUnauthorized("missing Authorization header"))?;

                let token = hdr
                    .strip_prefix("Bearer ")
                    .ok_or_else(|| ErrorUnauthorized("malformed Authorization header"))?;

                let secret =
                    env::var("JWT_SECRET").map_err(|_| ErrorUnauthorized("server mis-config"))?;
                let data = decode::<Claims>(
                    token,
                    &DecodingKey::from_secret(secret.as_bytes()),
                    &Validation::default(),
                )
                .map_err(|_| ErrorUnauthorized("invalid / expired token"))?;

                let player_id =
                    Uuid::parse_str(&data.claims.sub).map_err(|_| ErrorUnauthorized("bad sub"))?;

                Ok(JwtAuth {
                    player_id,
                    holdings: data.claims.holdings,
                })
            })();

            ready(res)
        }
    }
}
pub use extractor::JwtAuth;
