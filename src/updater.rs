use aws_config::meta::region::RegionProviderChain;
use aws_sdk_cloudformation::model::Parameter;
use aws_sdk_cloudformation::output::UpdateStackOutput;
use aws_sdk_cloudformation::Region;

use crate::config::Config;
use crate::template;

/// The stack this tool manages. The template content is hard-coded for it.
pub const STACK_NAME: &str = "cc-worker";

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum Error {
    #[error("Service error ocurred: {0}.")]
    ServiceError(String),

    #[error("Unknown error ocurred: {0}.")]
    UnknownError(String),

    #[error("Configuration is missing the `{0}` key")]
    MissingKey(String),

    #[error(transparent)]
    Template(#[from] crate::document::Error),
}

/// The single control-API operation this tool needs. The production
/// implementation wraps the CloudFormation SDK client; tests substitute a
/// recording stub.
#[allow(async_fn_in_trait)]
pub trait StackApi {
    async fn update_stack(
        &self,
        stack_name: &str,
        template_body: String,
        parameters: Vec<Parameter>,
    ) -> Result<UpdateStackOutput, Error>;
}

pub struct CloudFormation {
    client: aws_sdk_cloudformation::Client,
}

impl CloudFormation {
    pub async fn new(region: Option<String>) -> Self {
        let region_provider = match region {
            Some(provided_region) => RegionProviderChain::first_try(Region::new(provided_region)),
            None => RegionProviderChain::default_provider(),
        };

        let sdk_config = aws_config::from_env().region(region_provider).load().await;
        let client = aws_sdk_cloudformation::Client::new(&sdk_config);

        return Self { client };
    }
}

impl StackApi for CloudFormation {
    async fn update_stack(
        &self,
        stack_name: &str,
        template_body: String,
        parameters: Vec<Parameter>,
    ) -> Result<UpdateStackOutput, Error> {
        let result = self
            .client
            .update_stack()
            .stack_name(stack_name)
            .template_body(template_body)
            .set_parameters(Some(parameters))
            .send()
            .await;

        return match result {
            Ok(data) => Ok(data),
            Err(aws_sdk_cloudformation::types::SdkError::ServiceError { err, .. }) => {
                Err(Error::ServiceError(err.to_string()))
            }
            Err(err) => Err(Error::UnknownError(err.to_string())),
        };
    }
}

pub struct Updater<A: StackApi> {
    api: A,
}

impl<A: StackApi> Updater<A> {
    pub fn new(api: A) -> Self {
        return Self { api };
    }

    /// Builds the template and the parameter bindings, then issues a single
    /// `UpdateStack` call. A missing configuration value fails here, before
    /// anything is sent.
    pub async fn run(&self, config: &Config) -> Result<UpdateStackOutput, Error> {
        let template_body = template::build()?;
        let parameters = bindings(config)?;

        return self
            .api
            .update_stack(STACK_NAME, template_body, parameters)
            .await;
    }
}

/// Pairs each template parameter with its configuration value. ScaleCapacity
/// is never bound, so every update falls back to the template default of "1"
/// regardless of the fleet's current size.
fn bindings(config: &Config) -> Result<Vec<Parameter>, Error> {
    let pairs = [
        ("KeyName", &config.ssh_key_name, "SSHKeyName"),
        (
            "VPCAvailabilityZone1",
            &config.vpc_availability_zone_1,
            "VPCAvailabilityZone1",
        ),
        (
            "VPCAvailabilityZone2",
            &config.vpc_availability_zone_2,
            "VPCAvailabilityZone2",
        ),
        ("ApiSubnet1", &config.api_subnet_1, "ApiSubnet1"),
        ("ApiSubnet2", &config.api_subnet_2, "ApiSubnet2"),
        ("RootStackName", &config.root_stack_name, "RootStackName"),
        ("SecurityGroup", &config.security_group, "SecurityGroup"),
        ("ImageId", &config.image_id, "ImageId"),
        ("InstanceType", &config.instance_type, "InstanceType"),
    ];

    let mut parameters = Vec::with_capacity(pairs.len());
    for (parameter_key, value, config_key) in pairs {
        let value = match value {
            Some(value) => value,
            None => return Err(Error::MissingKey(config_key.to_string())),
        };

        parameters.push(
            Parameter::builder()
                .parameter_key(parameter_key)
                .parameter_value(value)
                .build(),
        );
    }

    return Ok(parameters);
}
