use super::{Credentials, DatabaseShape, Params, Provider, ProviderError, SecretData};
use crate::cluster::Service;

// The chart speaks the MySQL wire protocol and names its port accordingly.
const SHAPE: DatabaseShape = DatabaseShape {
    protocol: "mysql",
    port_name: "mysql",
    user_param: "mariadbUser",
    default_user: "root",
    root_password_key: "mariadb-root-password",
    user_password_key: "mariadb-password",
    database_param: "mariadbDatabase",
};

pub struct MariadbProvider;

impl Provider for MariadbProvider {
    fn bind(
        &self,
        services: &[Service],
        params: &Params,
        secrets: &SecretData,
    ) -> Result<Credentials, ProviderError> {
        SHAPE.credentials(services, params, secrets)
    }
}
