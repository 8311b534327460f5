use super::{Credentials, DatabaseShape, Params, Provider, ProviderError, SecretData};
use crate::cluster::Service;

const SHAPE: DatabaseShape = DatabaseShape {
    protocol: "mysql",
    port_name: "mysql",
    user_param: "mysqlUser",
    default_user: "root",
    root_password_key: "mysql-root-password",
    user_password_key: "mysql-password",
    database_param: "mysqlDatabase",
};

pub struct MysqlProvider;

impl Provider for MysqlProvider {
    fn bind(
        &self,
        services: &[Service],
        params: &Params,
        secrets: &SecretData,
    ) -> Result<Credentials, ProviderError> {
        SHAPE.credentials(services, params, secrets)
    }
}
