use super::{find_port, secret, Credentials, Params, Provider, ProviderError, SecretData};
use crate::cluster::Service;

const PORT_NAME: &str = "redis";
const PASSWORD_KEY: &str = "redis-password";

/// Redis has no users or databases to choose; only the password matters.
pub struct RedisProvider;

impl Provider for RedisProvider {
    fn bind(
        &self,
        services: &[Service],
        _params: &Params,
        secrets: &SecretData,
    ) -> Result<Credentials, ProviderError> {
        let (service, port) = find_port(services, PORT_NAME)?;
        let password = secret(secrets, PASSWORD_KEY)?;
        Credentials::new(
            "redis",
            service.host(),
            port.port,
            None,
            Some(password),
            None,
        )
    }
}
