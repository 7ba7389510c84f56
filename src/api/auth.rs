use tracing::info;

use super::ApiClient;
use crate::{
    error::ApiError,
    models::{Credentials, Registration, TokenResponse, User},
};

impl ApiClient {
    /// Exchange credentials for a token, fetch the matching user and store
    /// both in the session.
    ///
    /// The login request itself is sent anonymously, so rejected credentials
    /// come back as [`ApiError::Unauthorized`] without touching the session.
    pub async fn login(&self, credentials: &Credentials) -> Result<User, ApiError> {
        info!(username = %credentials.username, "Logging in");
        let token: TokenResponse = self
            .json_as(self.post("/auth/login").form(credentials), None, "login")
            .await?;

        let user: User = self
            .json_as(self.get("/auth/me"), Some(token.access_token.clone()), "current user")
            .await?;

        self.session().set_auth(user.clone(), token.access_token);
        Ok(user)
    }

    pub async fn register(&self, registration: &Registration) -> Result<User, ApiError> {
        self.json_as(self.post("/auth/register").json(registration), None, "register")
            .await
    }

    pub async fn me(&self) -> Result<User, ApiError> {
        self.json(self.get("/auth/me"), "current user").await
    }

    /// Drop the local session. The backend keeps no server-side session.
    pub fn logout(&self) -> bool {
        self.session().clear_auth()
    }
}
