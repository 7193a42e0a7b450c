//! Admin surface: user provisioning and instance-type definition.

use std::sync::Arc;

use tracing::info;

use super::spec_render::render_spec;
use crate::domain::errors::{SchedError, SchedResult};
use crate::domain::models::{Balance, InstanceType, Price, Role, TargetDescriptor, User};
use crate::domain::ports::{InstanceTypeRepository, UserRepository};

pub struct AdminService {
    users: Arc<dyn UserRepository>,
    types: Arc<dyn InstanceTypeRepository>,
}

impl AdminService {
    pub fn new(users: Arc<dyn UserRepository>, types: Arc<dyn InstanceTypeRepository>) -> Self {
        Self { users, types }
    }

    /// Create or replace a user's role and balance.
    pub async fn upsert_user(&self, name: &str, role: Role, balance: Balance) -> SchedResult<()> {
        let user = User {
            name: name.to_string(),
            role,
            balance,
            version: 0,
        };
        self.users.upsert(&user).await?;
        info!(user = name, role = role.as_str(), "user upserted");
        Ok(())
    }

    pub async fn get_user(&self, name: &str) -> SchedResult<User> {
        self.users
            .get(name)
            .await?
            .ok_or_else(|| SchedError::UserNotFound(name.to_string()))
    }

    /// Define or redefine an instance type, atomically replacing its
    /// target pool with `targets`, all idle. The configure blob must
    /// render before anything is written.
    pub async fn define_instance_type(
        &self,
        name: &str,
        description: &str,
        configure: &str,
        price: Price,
        targets: Vec<TargetDescriptor>,
    ) -> SchedResult<()> {
        render_spec(configure)?;
        let instance_type = InstanceType {
            name: name.to_string(),
            description: description.to_string(),
            configure: configure.to_string(),
            price,
        };
        self.types.replace_with_targets(&instance_type, &targets).await?;
        info!(instance_type = name, targets = targets.len(), "instance type defined");
        Ok(())
    }

    /// Delete an instance type and its targets.
    pub async fn delete_instance_type(&self, name: &str) -> SchedResult<()> {
        self.types.delete_cascade(name).await?;
        info!(instance_type = name, "instance type deleted");
        Ok(())
    }

    pub async fn get_instance_type(&self, name: &str) -> SchedResult<InstanceType> {
        self.types
            .get(name)
            .await?
            .ok_or_else(|| SchedError::InstanceTypeNotFound(name.to_string()))
    }

    pub async fn list_instance_types(&self) -> SchedResult<Vec<InstanceType>> {
        self.types.list().await
    }
}
