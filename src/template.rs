use serde_json::json;

use crate::document::{base64, join, r#ref, Error, Parameter, Resource, Template};

const NGINX_SITE: &str = "\
server {
    listen 80 default_server;
    root /var/www/html/public;
    index index.html index.htm index.php;
    server_name _;
    charset utf-8;
    location = /favicon.ico { log_not_found off; access_log off; }
    location = /robots.txt  { log_not_found off; access_log off; }
    location / {
        try_files $uri $uri/ /index.php$is_args$args;
    }
    location ~ \\.php$ {
        include snippets/fastcgi-php.conf;
        fastcgi_pass unix:/run/php/php7.2-fpm.sock;
    }
    error_page 404 /index.php;
}
";

const SUPERVISOR_CONF: &str = "\
[supervisord]
nodaemon=true
[program:nginx]
command=nginx
stdout_logfile=/dev/stdout
stdout_logfile_maxbytes=0
stderr_logfile=/dev/stderr
stderr_logfile_maxbytes=0
[program:php-fpm]
command=php-fpm7.2
stdout_logfile=/dev/stdout
stdout_logfile_maxbytes=0
stderr_logfile=/dev/stderr
stderr_logfile_maxbytes=0
[program:horizon]
process_name=%(program_name)s
command=php /var/www/html/artisan horizon
autostart=true
autorestart=true
user=root
redirect_stderr=true
stdout_logfile=/var/www/html/storage/logs/horizon.log
";

const PHP_FPM_CONF: &str = "\
[global]
pid = /run/php/php7.2-fpm.pid
error_log = /proc/self/fd/2
include=/etc/php/7.2/fpm/pool.d/*.conf
";

/// Builds the cc-worker fleet template and serializes it to JSON. The content
/// is fixed; only the parameter values vary at deploy time.
pub fn build() -> Result<String, Error> {
    let mut template = Template::new();

    template.add_parameter(
        "KeyName",
        Parameter::string(
            "Name of an existing EC2 KeyPair to enable SSH access to the instance",
        ),
    )?;
    template.add_parameter("ImageId", Parameter::string("ImageId of the EC2 instance"))?;
    template.add_parameter(
        "InstanceType",
        Parameter::string("Type of the EC2 instance"),
    )?;
    template.add_parameter(
        "ScaleCapacity",
        Parameter::string("Number of api servers to run").default("1"),
    )?;
    template.add_parameter(
        "VPCAvailabilityZone1",
        Parameter::string("First availability zone").length("1", "255"),
    )?;
    template.add_parameter(
        "VPCAvailabilityZone2",
        Parameter::string("Second availability zone").length("1", "255"),
    )?;
    template.add_parameter("SecurityGroup", Parameter::string("Security group."))?;
    template.add_parameter("RootStackName", Parameter::string("The root stack name"))?;
    template.add_parameter(
        "ApiSubnet1",
        Parameter::string("First private VPC subnet ID for the api app."),
    )?;
    template.add_parameter(
        "ApiSubnet2",
        Parameter::string("Second private VPC subnet ID for the api app."),
    )?;

    template.add_resource("LaunchConfiguration", launch_configuration())?;
    template.add_resource("AutoscalingGroup", autoscaling_group())?;

    return template.to_json();
}

fn launch_configuration() -> Resource {
    return Resource::new("AWS::AutoScaling::LaunchConfiguration")
        .metadata(bootstrap_metadata())
        .property("ImageId", r#ref("ImageId"))
        .property("InstanceType", r#ref("InstanceType"))
        .property("KeyName", r#ref("KeyName"))
        .property("SecurityGroups", json!([r#ref("SecurityGroup")]))
        .property(
            "IamInstanceProfile",
            json!("CodeDeployDemo-EC2-Instance-Profile"),
        )
        .property(
            "BlockDeviceMappings",
            json!([
                {
                    "DeviceName": "/dev/sda1",
                    "Ebs": { "VolumeSize": "8" }
                }
            ]),
        )
        .property("UserData", boot_script());
}

fn bootstrap_metadata() -> serde_json::Value {
    return json!({
        "AWS::CloudFormation::Init": {
            "configSets": {
                "InstallAndRun": ["Install"]
            },
            "Install": {
                "packages": {
                    "apt": {
                        "curl": [],
                        "zip": [],
                        "unzip": [],
                        "git": [],
                        "supervisor": [],
                        "sqlite3": [],
                        "nginx": [],
                        "php7.2-fpm": [],
                        "php7.2-mbstring": [],
                        "php7.2-xml": [],
                        "php7.2-zip": [],
                        "php7.2-curl": [],
                        "php7.2-mysql": [],
                        "php7.2-sqlite3": []
                    }
                },
                "files": {
                    "/etc/nginx/sites-available/default": {
                        "content": NGINX_SITE
                    },
                    "/etc/supervisor/conf.d/supervisord.conf": {
                        "content": SUPERVISOR_CONF
                    },
                    "/etc/php/7.2/fpm/php-fpm.conf": {
                        "content": PHP_FPM_CONF
                    }
                }
            }
        }
    });
}

/// First-boot script. Installs the CodeDeploy agent and the cfn-bootstrap
/// helpers, then runs cfn-init against the launch configuration metadata.
fn boot_script() -> serde_json::Value {
    return base64(join(
        "",
        vec![
            json!("#!/bin/bash -xe\n"),
            json!("apt-get update -y\n"),
            json!("apt-get install -y language-pack-en\n"),
            json!("locale-gen en_US.UTF-8\n"),
            json!("apt-get install -y ruby\n"),
            json!("wget https://aws-codedeploy-ap-south-1.s3.amazonaws.com/latest/install\n"),
            json!("chmod +x ./install\n"),
            json!("./install auto\n"),
            json!("service codedeploy-agent start\n"),
            json!("apt-get install -y software-properties-common python-software-properties\n"),
            json!("add-apt-repository -y ppa:ondrej/php\n"),
            json!("apt-get update -y\n"),
            json!("apt-get install -y python-setuptools\n"),
            json!("mkdir -p /opt/aws/bin\n"),
            json!("wget https://s3.amazonaws.com/cloudformation-examples/aws-cfn-bootstrap-latest.tar.gz\n"),
            json!("easy_install --script-dir /opt/aws/bin aws-cfn-bootstrap-latest.tar.gz\n"),
            json!("# Install the files and packages from the metadata\n"),
            json!("/opt/aws/bin/cfn-init -v "),
            json!(" --stack "),
            r#ref("AWS::StackName"),
            json!(" --resource LaunchConfiguration"),
            json!(" --configsets InstallAndRun "),
            json!(" --region "),
            r#ref("AWS::Region"),
            json!("\n"),
        ],
    ));
}

fn autoscaling_group() -> Resource {
    return Resource::new("AWS::AutoScaling::AutoScalingGroup")
        .property("DesiredCapacity", r#ref("ScaleCapacity"))
        .property("MinSize", r#ref("ScaleCapacity"))
        .property("MaxSize", r#ref("ScaleCapacity"))
        .property("LaunchConfigurationName", r#ref("LaunchConfiguration"))
        .property(
            "VPCZoneIdentifier",
            json!([r#ref("ApiSubnet1"), r#ref("ApiSubnet2")]),
        )
        .property(
            "AvailabilityZones",
            json!([r#ref("VPCAvailabilityZone1"), r#ref("VPCAvailabilityZone2")]),
        )
        .property("HealthCheckType", json!("EC2"))
        .property(
            "Tags",
            json!([
                { "Key": "App", "Value": "cc-worker", "PropagateAtLaunch": true },
                { "Key": "Name", "Value": "cc-worker", "PropagateAtLaunch": true }
            ]),
        )
        .update_policy(json!({
            "AutoScalingReplacingUpdate": {
                "WillReplace": true
            },
            "AutoScalingRollingUpdate": {
                "MaxBatchSize": "1",
                "MinInstancesInService": "1",
                "PauseTime": "PT5M",
                "WaitOnResourceSignals": true
            }
        }));
}

#[cfg(test)]
mod tests {
    use super::build;
    use crate::document::Template;
    use serde_json::{json, Value};

    fn built() -> Value {
        return serde_json::from_str(&build().unwrap()).unwrap();
    }

    #[test]
    fn declares_each_parameter_exactly_once() {
        let document = built();
        let parameters = document["Parameters"].as_object().unwrap();

        let expected = [
            "ApiSubnet1",
            "ApiSubnet2",
            "ImageId",
            "InstanceType",
            "KeyName",
            "RootStackName",
            "ScaleCapacity",
            "SecurityGroup",
            "VPCAvailabilityZone1",
            "VPCAvailabilityZone2",
        ];
        let declared: Vec<&str> = parameters.keys().map(String::as_str).collect();
        assert_eq!(declared, expected);
    }

    #[test]
    fn scale_capacity_defaults_to_one() {
        let document = built();
        assert_eq!(
            document["Parameters"]["ScaleCapacity"]["Default"],
            json!("1")
        );
    }

    #[test]
    fn launch_configuration_references_declared_parameters() {
        let document = built();
        let properties = &document["Resources"]["LaunchConfiguration"]["Properties"];

        assert_eq!(properties["ImageId"], json!({ "Ref": "ImageId" }));
        assert_eq!(properties["InstanceType"], json!({ "Ref": "InstanceType" }));
        assert_eq!(properties["KeyName"], json!({ "Ref": "KeyName" }));
        assert_eq!(
            properties["SecurityGroups"],
            json!([{ "Ref": "SecurityGroup" }])
        );
    }

    #[test]
    fn autoscaling_group_is_fixed_size() {
        let document = built();
        let properties = &document["Resources"]["AutoscalingGroup"]["Properties"];

        let scale = json!({ "Ref": "ScaleCapacity" });
        assert_eq!(properties["DesiredCapacity"], scale);
        assert_eq!(properties["MinSize"], scale);
        assert_eq!(properties["MaxSize"], scale);
    }

    #[test]
    fn update_policy_rolls_one_instance_at_a_time() {
        let document = built();
        let update_policy = &document["Resources"]["AutoscalingGroup"]["UpdatePolicy"];

        assert_eq!(
            update_policy["AutoScalingReplacingUpdate"]["WillReplace"],
            json!(true)
        );
        let rolling = &update_policy["AutoScalingRollingUpdate"];
        assert_eq!(rolling["MaxBatchSize"], json!("1"));
        assert_eq!(rolling["MinInstancesInService"], json!("1"));
        assert_eq!(rolling["PauseTime"], json!("PT5M"));
        assert_eq!(rolling["WaitOnResourceSignals"], json!(true));
    }

    #[test]
    fn boot_script_runs_cfn_init_against_the_config_set() {
        let document = built();
        let user_data =
            &document["Resources"]["LaunchConfiguration"]["Properties"]["UserData"];

        let parts = user_data["Fn::Base64"]["Fn::Join"][1].as_array().unwrap();
        assert_eq!(parts[0], json!("#!/bin/bash -xe\n"));
        assert_eq!(
            true,
            parts.contains(&json!(" --configsets InstallAndRun "))
        );
        assert_eq!(true, parts.contains(&json!({ "Ref": "AWS::StackName" })));
        assert_eq!(true, parts.contains(&json!({ "Ref": "AWS::Region" })));
    }

    #[test]
    fn serialization_round_trips() {
        let text = build().unwrap();

        let parsed: Template = serde_json::from_str(&text).unwrap();
        assert_eq!(text, parsed.to_json().unwrap());
    }
}
