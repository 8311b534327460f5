use super::{Credentials, DatabaseShape, Params, Provider, ProviderError, SecretData};
use crate::cluster::Service;

// One password key regardless of user.
const SHAPE: DatabaseShape = DatabaseShape {
    protocol: "postgresql",
    port_name: "postgresql",
    user_param: "postgresqlUsername",
    default_user: "postgres",
    root_password_key: "postgresql-password",
    user_password_key: "postgresql-password",
    database_param: "postgresqlDatabase",
};

pub struct PostgresqlProvider;

impl Provider for PostgresqlProvider {
    fn bind(
        &self,
        services: &[Service],
        params: &Params,
        secrets: &SecretData,
    ) -> Result<Credentials, ProviderError> {
        SHAPE.credentials(services, params, secrets)
    }
}
