use crate::images::cloudinary::{CloudinaryCredentials, DEFAULT_UPLOAD_URL};
use quill_common::model::auth::SessionSecret;
use serde::Deserialize;
use std::{
    fmt::{Debug, Formatter},
    net::IpAddr,
};

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Production,
}

/// Settings the request handlers consult.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub struct ServerConfig {
    pub environment: Environment,
    /// Only the author may update or delete a post.
    pub enforce_post_ownership: bool,
}

impl ServerConfig {
    #[must_use]
    pub fn secure_cookies(self) -> bool {
        self.environment == Environment::Production
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            environment: Environment::Development,
            enforce_post_ownership: true,
        }
    }
}

fn default_database_max_connections() -> u32 {
    5
}

fn default_cloudinary_upload_url() -> String {
    DEFAULT_UPLOAD_URL.to_owned()
}

fn default_enforce_post_ownership() -> bool {
    true
}

/// The process environment, read once at startup.
#[derive(Clone, Eq, PartialEq, Deserialize)]
pub struct Env {
    pub server_address: IpAddr,
    pub server_port: u16,
    pub database_url: Option<String>,
    #[serde(default = "default_database_max_connections")]
    pub database_max_connections: u32,
    pub jwt_secret: SessionSecret,
    #[serde(default)]
    pub app_env: Environment,
    pub cloudinary_cloud_name: Option<String>,
    pub cloudinary_api_key: Option<String>,
    pub cloudinary_api_secret: Option<String>,
    #[serde(default = "default_cloudinary_upload_url")]
    pub cloudinary_upload_url: String,
    #[serde(default = "default_enforce_post_ownership")]
    pub enforce_post_ownership: bool,
}

impl Env {
    #[must_use]
    pub fn server_config(&self) -> ServerConfig {
        ServerConfig {
            environment: self.app_env,
            enforce_post_ownership: self.enforce_post_ownership,
        }
    }

    /// `None` unless all three Cloudinary variables are set.
    #[must_use]
    pub fn cloudinary_credentials(&self) -> Option<CloudinaryCredentials> {
        Some(CloudinaryCredentials {
            cloud_name: self.cloudinary_cloud_name.clone()?,
            api_key: self.cloudinary_api_key.clone()?,
            api_secret: self.cloudinary_api_secret.clone()?,
        })
    }
}

impl Debug for Env {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Env")
            .field("server_address", &self.server_address)
            .field("server_port", &self.server_port)
            .field(
                "database_url",
                &self.database_url.as_ref().map(|_| "[redacted]"),
            )
            .field("database_max_connections", &self.database_max_connections)
            .field("jwt_secret", &self.jwt_secret)
            .field("app_env", &self.app_env)
            .field("cloudinary_cloud_name", &self.cloudinary_cloud_name)
            .field("cloudinary_api_key", &self.cloudinary_api_key)
            .field(
                "cloudinary_api_secret",
                &self.cloudinary_api_secret.as_ref().map(|_| "[redacted]"),
            )
            .field("cloudinary_upload_url", &self.cloudinary_upload_url)
            .field("enforce_post_ownership", &self.enforce_post_ownership)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use crate::config::{Env, Environment};

    fn env(vars: &[(&str, &str)]) -> Result<Env, envy::Error> {
        envy::from_iter(
            vars.iter()
                .map(|(key, value)| ((*key).to_owned(), (*value).to_owned())),
        )
    }

    #[test]
    fn minimal_environment() {
        let env = env(&[
            ("SERVER_ADDRESS", "127.0.0.1"),
            ("SERVER_PORT", "5000"),
            ("JWT_SECRET", "s3cr3t"),
        ])
        .unwrap();

        assert_eq!(env.server_port, 5000);
        assert_eq!(env.database_url, None);
        assert_eq!(env.database_max_connections, 5);
        assert_eq!(env.app_env, Environment::Development);
        assert!(env.enforce_post_ownership);
        assert!(env.cloudinary_credentials().is_none());
        assert!(!env.server_config().secure_cookies());
    }

    #[test]
    fn full_environment() {
        let env = env(&[
            ("SERVER_ADDRESS", "0.0.0.0"),
            ("SERVER_PORT", "8080"),
            ("JWT_SECRET", "s3cr3t"),
            ("DATABASE_URL", "postgres://quill:pw@localhost/quill"),
            ("APP_ENV", "production"),
            ("CLOUDINARY_CLOUD_NAME", "demo"),
            ("CLOUDINARY_API_KEY", "key"),
            ("CLOUDINARY_API_SECRET", "cloud-secret"),
            ("ENFORCE_POST_OWNERSHIP", "false"),
        ])
        .unwrap();

        let config = env.server_config();
        assert!(config.secure_cookies());
        assert!(!config.enforce_post_ownership);
        assert_eq!(env.cloudinary_credentials().unwrap().cloud_name, "demo");

        let debug = format!("{env:?}");
        assert!(!debug.contains("s3cr3t"));
        assert!(!debug.contains(":pw@"));
        assert!(!debug.contains("cloud-secret"));
    }

    #[test]
    fn secret_is_required() {
        assert!(env(&[("SERVER_ADDRESS", "127.0.0.1"), ("SERVER_PORT", "5000")]).is_err());
    }
}
