use serde::{Deserialize, Serialize};
use std::{fs, io, path::PathBuf};
use validator::Validate;

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum Error {
    #[error("File {0} not found")]
    FileNotFound(String),

    #[error("Parsing error: {0}")]
    ParsingError(String),

    #[error("Validation errors: {0}")]
    ValidationError(String),

    #[error("Unknown error occurred: {0}")]
    Unknown(String),
}

/// The `DEFAULT` section of the deployment configuration. Every key except
/// `Region` is required; each one backs a template parameter binding.
#[derive(Debug, Default, Serialize, Deserialize, Validate)]
pub struct Config {
    #[serde(rename = "SSHKeyName")]
    #[validate(required)]
    pub ssh_key_name: Option<String>,

    #[serde(rename = "VPCAvailabilityZone1")]
    #[validate(required)]
    pub vpc_availability_zone_1: Option<String>,

    #[serde(rename = "VPCAvailabilityZone2")]
    #[validate(required)]
    pub vpc_availability_zone_2: Option<String>,

    #[serde(rename = "ApiSubnet1")]
    #[validate(required)]
    pub api_subnet_1: Option<String>,

    #[serde(rename = "ApiSubnet2")]
    #[validate(required)]
    pub api_subnet_2: Option<String>,

    #[serde(rename = "RootStackName")]
    #[validate(required)]
    pub root_stack_name: Option<String>,

    #[serde(rename = "SecurityGroup")]
    #[validate(required)]
    pub security_group: Option<String>,

    #[serde(rename = "ImageId")]
    #[validate(required)]
    pub image_id: Option<String>,

    #[serde(rename = "InstanceType")]
    #[validate(required)]
    pub instance_type: Option<String>,

    #[serde(rename = "Region")]
    pub region: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ConfigDocument {
    #[serde(rename = "DEFAULT")]
    default: Config,
}

pub fn parse(path: &PathBuf) -> Result<Config, Error> {
    let contents = match fs::read_to_string(path) {
        Ok(raw_contents) => Ok(raw_contents),
        Err(error) => match error.kind() {
            io::ErrorKind::NotFound => Err(Error::FileNotFound(path.display().to_string())),
            _ => Err(Error::Unknown(error.to_string())),
        },
    }?;

    let document: ConfigDocument = match serde_yaml::from_str(&contents) {
        Ok(data) => Ok(data),
        Err(error) => Err(Error::ParsingError(error.to_string())),
    }?;

    let config = document.default;
    match config.validate() {
        Ok(_) => (),
        Err(error) => return Err(Error::ValidationError(error.to_string())),
    }

    return Ok(config);
}

#[cfg(test)]
pub mod tests {
    use std::fs::File;
    use std::io::Write;

    use super::parse;
    use super::Config;
    use super::ConfigDocument;
    use super::Error;
    use tempfile::tempdir;

    pub fn full_config() -> Config {
        return Config {
            ssh_key_name: Some(String::from("k1")),
            vpc_availability_zone_1: Some(String::from("az1")),
            vpc_availability_zone_2: Some(String::from("az2")),
            api_subnet_1: Some(String::from("s1")),
            api_subnet_2: Some(String::from("s2")),
            root_stack_name: Some(String::from("root")),
            security_group: Some(String::from("sg1")),
            image_id: Some(String::from("ami-1")),
            instance_type: Some(String::from("t3.micro")),
            region: None,
        };
    }

    #[test]
    fn file_does_not_exist() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("config.yaml");

        let result = parse(&file_path);
        assert_eq!(true, result.is_err());
        match result.err().unwrap() {
            Error::FileNotFound(_) => {}
            _ => panic!("Expected `FileNotFound` error"),
        }
    }

    #[test]
    fn file_wrong_format() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("config.yaml");

        let mut file = File::create(&file_path).unwrap();
        writeln!(file, "Not yaml").unwrap();

        let result = parse(&file_path);
        assert_eq!(true, result.is_err());
        match result.err().unwrap() {
            Error::ParsingError(_) => {}
            _ => panic!("Expected `ParsingError` error"),
        }
    }

    #[test]
    fn file_missing_image_id() {
        let mut config = full_config();
        config.image_id = None;
        let document = ConfigDocument { default: config };
        let config_contents = serde_yaml::to_string(&document).unwrap();

        let dir = tempdir().unwrap();
        let file_path = dir.path().join("config.yaml");

        let mut file = File::create(&file_path).unwrap();
        writeln!(file, "{}", config_contents).unwrap();

        let result = parse(&file_path);
        assert_eq!(true, result.is_err());
        match result.err().unwrap() {
            Error::ValidationError(_) => {}
            _ => panic!("Expected `ValidationError` error"),
        }
    }

    #[test]
    fn parses_the_config() {
        let document = ConfigDocument {
            default: full_config(),
        };
        let config_contents = serde_yaml::to_string(&document).unwrap();

        let dir = tempdir().unwrap();
        let file_path = dir.path().join("config.yaml");

        let mut file = File::create(&file_path).unwrap();
        writeln!(file, "{}", config_contents).unwrap();

        let result = parse(&file_path);
        assert_eq!(false, result.is_err());
        let config = result.unwrap();
        assert_eq!(config.image_id.as_deref(), Some("ami-1"));
        assert_eq!(config.instance_type.as_deref(), Some("t3.micro"));
    }
}
