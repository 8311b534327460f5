use super::{Credentials, DatabaseShape, Params, Provider, ProviderError, SecretData};
use crate::cluster::Service;

const SHAPE: DatabaseShape = DatabaseShape {
    protocol: "mongodb",
    port_name: "mongodb",
    user_param: "mongodbUsername",
    default_user: "root",
    root_password_key: "mongodb-root-password",
    user_password_key: "mongodb-password",
    database_param: "mongodbDatabase",
};

pub struct MongodbProvider;

impl Provider for MongodbProvider {
    fn bind(
        &self,
        services: &[Service],
        params: &Params,
        secrets: &SecretData,
    ) -> Result<Credentials, ProviderError> {
        SHAPE.credentials(services, params, secrets)
    }
}
