//! Sample catalog.
//!
//! A handful of resource kinds wired through the engine end to end: union
//! attachments, ordered actions, deeply nested lifecycle rules and constrained
//! names. They are deliberately small and do not try to track the provider.

use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use crate::block::{EmissionPlan, EmitStep, Omit};
use crate::descriptor::{Constraint, TypeDescriptor};
use crate::registry::{ResourceKind, ResourceModule};
use crate::schema::{validators, AttributeSpec, ResourceSchema};
use crate::session::{Session, SessionConfig};

static WORKGROUP_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-zA-Z0-9_-]+$").expect("static regex"));
static S3_URI: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^s3://[a-z0-9][a-z0-9.-]*(/.*)?$").expect("static regex"));

/// Every sample module, in registration order.
pub fn modules() -> Vec<ResourceModule> {
    vec![autoscaling(), elbv2(), s3(), athena()]
}

/// A session with the sample catalog registered.
pub fn session(config: SessionConfig) -> Session {
    let session = Session::new(config);
    for module in modules() {
        session.register(module);
    }
    session
}

fn is_status_code(s: &str) -> bool {
    s.len() == 3
        && matches!(s.as_bytes()[0], b'2' | b'4' | b'5')
        && s.bytes().all(|b| b.is_ascii_digit())
}

fn tags() -> TypeDescriptor {
    TypeDescriptor::map_of(TypeDescriptor::string().with_constraint(Constraint::max_length(256)))
}

// ————————————————————————————————————————————————————————————————————————————
// aws.autoscaling
// ————————————————————————————————————————————————————————————————————————————

pub fn autoscaling() -> ResourceModule {
    let schema = ResourceSchema::new("aws_autoscaling_attachment")
        .with_description("Attaches a load balancer or target group to an autoscaling group")
        .attribute(AttributeSpec::required(
            "autoscaling_group_name",
            TypeDescriptor::string().with_constraint(Constraint::length(1, 255)),
        ))
        .attribute(AttributeSpec::optional("elb", TypeDescriptor::string()))
        .attribute(AttributeSpec::optional("lb_target_group_arn", TypeDescriptor::string()))
        .attribute(
            AttributeSpec::optional("alb_target_group_arn", TypeDescriptor::string())
                .with_description("Deprecated alias of `lb_target_group_arn`"),
        )
        .validator(validators::alias("alb_target_group_arn", "lb_target_group_arn"))
        .validator(validators::exactly_one_of(&["elb", "lb_target_group_arn"]))
        .derive("attachment_type", |attrs| {
            let kind = if attrs.contains("elb") { "elb" } else { "target_group" };
            Some(Value::from(kind))
        });

    let plan =
        EmissionPlan::new().scalars(["autoscaling_group_name", "elb", "lb_target_group_arn"]);

    let kind = ResourceKind::new(schema, plan).computed("attachment_type", |attrs| {
        attrs.derived_value("attachment_type").cloned().unwrap_or(Value::Null)
    });

    ResourceModule::new("aws.autoscaling").kind(kind)
}

// ————————————————————————————————————————————————————————————————————————————
// aws.elbv2
// ————————————————————————————————————————————————————————————————————————————

pub fn elbv2() -> ResourceModule {
    let redirect = ResourceSchema::new("redirect")
        .attribute(AttributeSpec::required(
            "status_code",
            TypeDescriptor::enumeration(["HTTP_301", "HTTP_302"]),
        ))
        .attribute(AttributeSpec::optional(
            "protocol",
            TypeDescriptor::enumeration(["HTTP", "HTTPS", "#{protocol}"]),
        ))
        .attribute(AttributeSpec::optional("port", TypeDescriptor::string()))
        .attribute(AttributeSpec::optional("host", TypeDescriptor::string()))
        .attribute(AttributeSpec::optional("path", TypeDescriptor::string()))
        .attribute(AttributeSpec::optional("query", TypeDescriptor::string()));

    let fixed_response = ResourceSchema::new("fixed_response")
        .attribute(AttributeSpec::required(
            "content_type",
            TypeDescriptor::enumeration([
                "text/plain",
                "text/css",
                "text/html",
                "application/javascript",
                "application/json",
            ]),
        ))
        .attribute(AttributeSpec::optional(
            "message_body",
            TypeDescriptor::string().with_constraint(Constraint::max_length(1024)),
        ))
        .attribute(AttributeSpec::optional(
            "status_code",
            TypeDescriptor::string().with_constraint(Constraint::predicate(
                "must be a 2XX, 4XX or 5XX status code",
                |v| v.as_str().is_some_and(is_status_code),
            )),
        ));

    let action = ResourceSchema::new("default_action")
        .attribute(AttributeSpec::required(
            "type",
            TypeDescriptor::enumeration([
                "forward",
                "redirect",
                "fixed-response",
                "authenticate-cognito",
                "authenticate-oidc",
            ]),
        ))
        .attribute(AttributeSpec::required(
            "order",
            TypeDescriptor::integer().with_constraint(Constraint::range(1.0, 50000.0)),
        ))
        .attribute(AttributeSpec::optional("target_group_arn", TypeDescriptor::string()))
        .attribute(AttributeSpec::optional("redirect", TypeDescriptor::nested(redirect)))
        .attribute(AttributeSpec::optional(
            "fixed_response",
            TypeDescriptor::nested(fixed_response),
        ))
        .validator(validators::at_most_one_of(&[
            "target_group_arn",
            "redirect",
            "fixed_response",
        ]))
        .validator(validators::check("`forward` actions require `target_group_arn`", |r| {
            r.get("type").and_then(Value::as_str) != Some("forward") || r.is_set("target_group_arn")
        }));

    let schema = ResourceSchema::new("aws_lb_listener")
        .attribute(AttributeSpec::required("load_balancer_arn", TypeDescriptor::string()))
        .attribute(AttributeSpec::optional(
            "port",
            TypeDescriptor::integer().with_constraint(Constraint::range(1.0, 65535.0)),
        ))
        .attribute(AttributeSpec::optional(
            "protocol",
            TypeDescriptor::enumeration([
                "HTTP",
                "HTTPS",
                "TCP",
                "TLS",
                "UDP",
                "TCP_UDP",
                "GENEVE",
            ]),
        ))
        .attribute(AttributeSpec::optional("ssl_policy", TypeDescriptor::string()))
        .attribute(AttributeSpec::optional("certificate_arn", TypeDescriptor::string()))
        .attribute(AttributeSpec::required(
            "default_action",
            TypeDescriptor::array_of(TypeDescriptor::nested(action)).with_items(Some(1), None),
        ))
        .attribute(AttributeSpec::optional("tags", tags()))
        .validator(validators::unique_by("default_action", "order"))
        .validator(validators::check("HTTPS and TLS listeners require `certificate_arn`", |r| {
            let protocol = r.get("protocol").and_then(Value::as_str);
            !matches!(protocol, Some("HTTPS" | "TLS")) || r.is_set("certificate_arn")
        }))
        .derive("sorted_default_action", |attrs| {
            let mut actions = attrs.array("default_action").to_vec();
            actions.sort_by_key(|a| a.get("order").and_then(Value::as_i64).unwrap_or(i64::MAX));
            Some(Value::Array(actions))
        });

    let action_plan = EmissionPlan::new()
        .scalars(["type", "order", "target_group_arn"])
        .block(
            "redirect",
            EmissionPlan::new().scalars([
                "status_code",
                "protocol",
                "port",
                "host",
                "path",
                "query",
            ]),
        )
        .block(
            "fixed_response",
            EmissionPlan::new().scalars(["content_type", "message_body", "status_code"]),
        );

    let plan = EmissionPlan::new()
        .scalars(["load_balancer_arn", "port", "protocol", "ssl_policy", "certificate_arn"])
        .repeated("default_action", action_plan)
        .keyed("tags");

    let kind = ResourceKind::new(schema, plan)
        .with_outputs(["id", "arn"])
        .computed("is_secure", |attrs| {
            Value::from(matches!(attrs.str("protocol"), Some("HTTPS" | "TLS")))
        })
        .computed("action_types", |attrs| {
            let sorted = attrs.derived_value("sorted_default_action").and_then(Value::as_array);
            Value::Array(
                sorted
                    .into_iter()
                    .flatten()
                    .filter_map(|a| a.get("type").cloned())
                    .collect(),
            )
        });

    ResourceModule::new("aws.elbv2").kind(kind)
}

// ————————————————————————————————————————————————————————————————————————————
// aws.s3
// ————————————————————————————————————————————————————————————————————————————

pub fn s3() -> ResourceModule {
    let size = || TypeDescriptor::integer().with_constraint(Constraint::at_least(0.0));

    let tag = Arc::new(
        ResourceSchema::new("tag")
            .attribute(AttributeSpec::required(
                "key",
                TypeDescriptor::string().with_constraint(Constraint::length(1, 128)),
            ))
            .attribute(AttributeSpec::required("value", TypeDescriptor::string())),
    );

    let and = ResourceSchema::new("and")
        .attribute(AttributeSpec::optional("prefix", TypeDescriptor::string()))
        .attribute(AttributeSpec::optional("tags", tags()))
        .attribute(AttributeSpec::optional("object_size_greater_than", size()))
        .attribute(AttributeSpec::optional("object_size_less_than", size()));

    let filter = ResourceSchema::new("filter")
        .attribute(AttributeSpec::optional("prefix", TypeDescriptor::string()))
        .attribute(AttributeSpec::optional("tag", TypeDescriptor::nested(tag)))
        .attribute(AttributeSpec::optional("and", TypeDescriptor::nested(and)))
        .attribute(AttributeSpec::optional("object_size_greater_than", size()))
        .attribute(AttributeSpec::optional("object_size_less_than", size()))
        .validator(validators::at_most_one_of(&[
            "prefix",
            "tag",
            "and",
            "object_size_greater_than",
            "object_size_less_than",
        ]));

    let days = || TypeDescriptor::integer().with_constraint(Constraint::at_least(1.0));

    let expiration = ResourceSchema::new("expiration")
        .attribute(AttributeSpec::optional("days", days()))
        .attribute(AttributeSpec::optional("date", TypeDescriptor::string()))
        .attribute(AttributeSpec::optional(
            "expired_object_delete_marker",
            TypeDescriptor::bool(),
        ))
        .validator(validators::at_most_one_of(&["days", "date"]));

    let transition = ResourceSchema::new("transition")
        .attribute(AttributeSpec::optional("days", size()))
        .attribute(AttributeSpec::optional("date", TypeDescriptor::string()))
        .attribute(AttributeSpec::required(
            "storage_class",
            TypeDescriptor::enumeration([
                "GLACIER",
                "STANDARD_IA",
                "ONEZONE_IA",
                "INTELLIGENT_TIERING",
                "DEEP_ARCHIVE",
                "GLACIER_IR",
            ]),
        ))
        .validator(validators::exactly_one_of(&["days", "date"]));

    let abort_upload = ResourceSchema::new("abort_incomplete_multipart_upload")
        .attribute(AttributeSpec::required("days_after_initiation", days()));

    let rule = ResourceSchema::new("rule")
        .attribute(AttributeSpec::required(
            "id",
            TypeDescriptor::string().with_constraint(Constraint::length(1, 255)),
        ))
        .attribute(AttributeSpec::required(
            "status",
            TypeDescriptor::enumeration(["Enabled", "Disabled"]),
        ))
        .attribute(AttributeSpec::optional("filter", TypeDescriptor::nested(filter)))
        .attribute(AttributeSpec::optional("expiration", TypeDescriptor::nested(expiration)))
        .attribute(AttributeSpec::optional(
            "transition",
            TypeDescriptor::array_of(TypeDescriptor::nested(transition)),
        ))
        .attribute(AttributeSpec::optional(
            "abort_incomplete_multipart_upload",
            TypeDescriptor::nested(abort_upload),
        ));

    let schema = ResourceSchema::new("aws_s3_bucket_lifecycle_configuration")
        .attribute(AttributeSpec::required(
            "bucket",
            TypeDescriptor::string().with_constraint(Constraint::length(3, 63)),
        ))
        .attribute(AttributeSpec::optional("expected_bucket_owner", TypeDescriptor::string()))
        .attribute(AttributeSpec::required(
            "rule",
            TypeDescriptor::array_of(TypeDescriptor::nested(rule)).with_items(Some(1), Some(1000)),
        ))
        .validator(validators::unique_by("rule", "id"));

    let sizes = ["object_size_greater_than", "object_size_less_than"];
    let filter_plan = EmissionPlan::new().one_of(vec![
        EmitStep::scalar("prefix"),
        EmitStep::block("tag", EmissionPlan::new().scalars(["key", "value"])),
        EmitStep::block("and", EmissionPlan::new().scalar("prefix").keyed("tags").scalars(sizes)),
        EmitStep::scalar("object_size_greater_than"),
        EmitStep::scalar("object_size_less_than"),
    ]);

    let rule_plan = EmissionPlan::new()
        .scalars(["id", "status"])
        .block("filter", filter_plan)
        .block(
            "expiration",
            EmissionPlan::new()
                .scalars(["days", "date"])
                .step(EmitStep::scalar("expired_object_delete_marker").omit(Omit::Falsy)),
        )
        .repeated("transition", EmissionPlan::new().scalars(["days", "date", "storage_class"]))
        .block(
            "abort_incomplete_multipart_upload",
            EmissionPlan::new().scalar("days_after_initiation"),
        );

    let plan = EmissionPlan::new()
        .scalars(["bucket", "expected_bucket_owner"])
        .repeated("rule", rule_plan);

    let kind = ResourceKind::new(schema, plan)
        .computed("rule_count", |attrs| Value::from(attrs.array("rule").len()))
        .computed("enabled_rule_count", |attrs| {
            let enabled = attrs
                .array("rule")
                .iter()
                .filter(|r| r.get("status").and_then(Value::as_str) == Some("Enabled"))
                .count();
            Value::from(enabled)
        });

    ResourceModule::new("aws.s3").kind(kind)
}

// ————————————————————————————————————————————————————————————————————————————
// aws.athena
// ————————————————————————————————————————————————————————————————————————————

pub fn athena() -> ResourceModule {
    let encryption = ResourceSchema::new("encryption_configuration")
        .attribute(AttributeSpec::required(
            "encryption_option",
            TypeDescriptor::enumeration(["SSE_S3", "SSE_KMS", "CSE_KMS"]),
        ))
        .attribute(AttributeSpec::optional("kms_key_arn", TypeDescriptor::string()))
        .validator(validators::check("`kms_key_arn` is required for SSE_KMS and CSE_KMS", |r| {
            let option = r.get("encryption_option").and_then(Value::as_str);
            !matches!(option, Some("SSE_KMS" | "CSE_KMS")) || r.is_set("kms_key_arn")
        }));

    let result = ResourceSchema::new("result_configuration")
        .attribute(
            AttributeSpec::optional(
                "output_location",
                TypeDescriptor::string()
                    .with_constraint(Constraint::pattern(S3_URI.clone(), "must be an s3:// URI")),
            )
            .with_validator(|v| match v.as_str() {
                Some(s) if !s.ends_with('/') => Ok(Value::from(format!("{s}/"))),
                _ => Ok(v.clone()),
            }),
        )
        .attribute(AttributeSpec::optional(
            "encryption_configuration",
            TypeDescriptor::nested(encryption),
        ));

    let configuration = ResourceSchema::new("configuration")
        .attribute(AttributeSpec::optional(
            "bytes_scanned_cutoff_per_query",
            TypeDescriptor::integer().with_constraint(Constraint::at_least(10_485_760.0)),
        ))
        .attribute(AttributeSpec::optional(
            "enforce_workgroup_configuration",
            TypeDescriptor::bool().with_default(true),
        ))
        .attribute(AttributeSpec::optional(
            "publish_cloudwatch_metrics_enabled",
            TypeDescriptor::bool().with_default(true),
        ))
        .attribute(AttributeSpec::optional("result_configuration", TypeDescriptor::nested(result)));

    let schema = ResourceSchema::new("aws_athena_workgroup")
        .attribute(AttributeSpec::required(
            "name",
            TypeDescriptor::string().constrained([
                Constraint::length(1, 128),
                Constraint::pattern(WORKGROUP_NAME.clone(), "may only contain [a-zA-Z0-9_-]"),
            ]),
        ))
        .attribute(AttributeSpec::optional(
            "description",
            TypeDescriptor::string().with_constraint(Constraint::max_length(1024)),
        ))
        .attribute(AttributeSpec::optional(
            "state",
            TypeDescriptor::enumeration(["ENABLED", "DISABLED"]).with_default("ENABLED"),
        ))
        .attribute(AttributeSpec::optional(
            "force_destroy",
            TypeDescriptor::bool().with_default(false),
        ))
        .attribute(AttributeSpec::optional(
            "configuration",
            TypeDescriptor::nested(configuration),
        ))
        .attribute(AttributeSpec::optional("tags", tags()));

    let plan = EmissionPlan::new()
        .scalars(["name", "description"])
        .step(EmitStep::scalar("state").omit(Omit::Never))
        .step(EmitStep::scalar("force_destroy").omit(Omit::Never))
        .block(
            "configuration",
            EmissionPlan::new()
                .scalars([
                    "bytes_scanned_cutoff_per_query",
                    "enforce_workgroup_configuration",
                    "publish_cloudwatch_metrics_enabled",
                ])
                .block(
                    "result_configuration",
                    EmissionPlan::new().scalar("output_location").block(
                        "encryption_configuration",
                        EmissionPlan::new().scalars(["encryption_option", "kms_key_arn"]),
                    ),
                ),
        )
        .keyed("tags");

    let kind = ResourceKind::new(schema, plan)
        .with_outputs(["id", "arn"])
        .computed("is_enabled", |attrs| {
            Value::from(attrs.str("state") != Some("DISABLED"))
        });

    ResourceModule::new("aws.athena").kind(kind)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SynthError;
    use serde_json::{json, Map};

    fn attrs(v: Value) -> Map<String, Value> {
        match v {
            Value::Object(m) => m,
            _ => panic!("fixture must be an object"),
        }
    }

    fn catalog() -> Session {
        session(SessionConfig { parallel: false, ..SessionConfig::default() })
    }

    #[test]
    fn registers_every_sample_namespace() {
        let s = catalog();
        for ns in ["aws.autoscaling", "aws.elbv2", "aws.s3", "aws.athena"] {
            assert!(s.lookup(ns).is_some(), "{ns}");
        }
        assert_eq!(s.kinds().len(), 4);
        // re-registering the same modules changes nothing
        assert!(modules().into_iter().all(|m| !s.register(m)));
    }

    #[test]
    fn attachment_alias_resolves_to_target_group() {
        let s = catalog();
        let input = json!({"autoscaling_group_name": "asg", "albTargetGroupArn": "arn:tg"});
        let r = s.declare("aws_autoscaling_attachment", "web", &attrs(input)).unwrap();
        assert_eq!(r.computed("attachment_type"), Some(&json!("target_group")));
        assert_eq!(
            s.manifest().get("aws_autoscaling_attachment", "web").unwrap().to_value(),
            json!({"autoscaling_group_name": "asg", "lb_target_group_arn": "arn:tg"})
        );
    }

    #[test]
    fn forward_actions_need_a_target() {
        let s = catalog();
        let input = json!({
            "load_balancer_arn": "arn:lb",
            "default_action": [{"type": "forward", "order": 1}]
        });
        let err = s.check("aws_lb_listener", "web", &attrs(input)).unwrap_err();
        assert_eq!(err, SynthError::invariant("`forward` actions require `target_group_arn`"));
    }

    #[test]
    fn https_listener_requires_certificate() {
        let s = catalog();
        let input = json!({
            "load_balancer_arn": "arn:lb",
            "protocol": "HTTPS",
            "port": 443,
            "default_action": [{"type": "forward", "order": 1, "target_group_arn": "arn:tg"}]
        });
        let err = s.check("aws_lb_listener", "web", &attrs(input.clone())).unwrap_err();
        assert!(matches!(err, SynthError::CrossFieldInvariantViolation { .. }));

        let mut ok = input;
        ok["certificate_arn"] = json!("arn:cert");
        let r = s.check("aws_lb_listener", "web", &attrs(ok)).unwrap();
        assert_eq!(r.computed("is_secure"), Some(&json!(true)));
    }

    #[test]
    fn kms_encryption_needs_a_key() {
        let s = catalog();
        let input = json!({
            "name": "analytics",
            "configuration": {
                "result_configuration": {
                    "encryption_configuration": {"encryption_option": "SSE_KMS"}
                }
            }
        });
        let err = s.check("aws_athena_workgroup", "analytics", &attrs(input)).unwrap_err();
        assert!(matches!(err, SynthError::CrossFieldInvariantViolation { .. }));
    }

    #[test]
    fn output_location_gets_trailing_slash() {
        let s = catalog();
        let input = json!({
            "name": "analytics",
            "configuration": {
                "result_configuration": {"output_location": "s3://query-results/athena"}
            }
        });
        s.declare("aws_athena_workgroup", "analytics", &attrs(input)).unwrap();
        let doc = s.document();
        let workgroup = &doc["resource"]["aws_athena_workgroup"]["analytics"];
        assert_eq!(
            workgroup["configuration"]["result_configuration"]["output_location"],
            json!("s3://query-results/athena/")
        );
        assert_eq!(workgroup["state"], json!("ENABLED"));
        assert_eq!(workgroup["force_destroy"], json!(false));

        let input = json!({
            "name": "other",
            "configuration": {"result_configuration": {"output_location": "gs://nope"}}
        });
        let err = s.check("aws_athena_workgroup", "other", &attrs(input)).unwrap_err();
        assert_eq!(err.field(), Some("configuration.result_configuration.output_location"));
    }

    #[test]
    fn transitions_need_exactly_one_schedule() {
        let s = catalog();
        let input = json!({
            "bucket": "logs",
            "rule": [{
                "id": "archive",
                "status": "Enabled",
                "transition": [{"storage_class": "GLACIER"}]
            }]
        });
        let err = s
            .check("aws_s3_bucket_lifecycle_configuration", "logs", &attrs(input))
            .unwrap_err();
        assert_eq!(err, SynthError::invariant("exactly one of [days, date] must be set"));
    }
}
