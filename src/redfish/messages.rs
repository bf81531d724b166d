//! Redfish Error Messages
//!
//! The `CommonError` body returned for every failed request and the
//! `Base` registry messages used by the chassis handlers.

use serde::{Deserialize, Serialize};
use serde_json::Value;

// =============================================================================
// Message IDs
// =============================================================================

pub const GENERAL_ERROR: &str = "Base.1.10.0.GeneralError";
pub const MALFORMED_JSON: &str = "Base.1.10.0.MalformedJSON";
pub const PROPERTY_MISSING: &str = "Base.1.10.0.PropertyMissing";
pub const PROPERTY_VALUE_NOT_IN_LIST: &str = "Base.1.10.0.PropertyValueNotInList";
pub const PROPERTY_VALUE_CONFLICT: &str = "Base.1.10.0.PropertyValueConflict";
pub const RESOURCE_NOT_FOUND: &str = "Base.1.10.0.ResourceNotFound";
pub const RESOURCE_IN_USE: &str = "Base.1.10.0.ResourceInUse";
pub const RESOURCE_ALREADY_EXISTS: &str = "Base.1.10.0.ResourceAlreadyExists";

const MESSAGE_ODATA_TYPE: &str = "#Message.v1_0_8.Message";
const SEE_EXTENDED_INFO: &str = "An error has occurred. See ExtendedInfo for more information.";

// =============================================================================
// Error Body
// =============================================================================

/// Top level Redfish error body: `{"error": {...}}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommonError {
    pub error: ErrorClass,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorClass {
    pub code: String,
    pub message: String,
    #[serde(
        rename = "@Message.ExtendedInfo",
        default,
        skip_serializing_if = "Vec::is_empty"
    )]
    pub extended_info: Vec<MsgExtendedInfo>,
}

/// One entry of `@Message.ExtendedInfo`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MsgExtendedInfo {
    #[serde(rename = "@odata.type")]
    pub odata_type: String,
    #[serde(rename = "MessageId")]
    pub message_id: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub message_args: Vec<Value>,
    pub severity: String,
    pub resolution: String,
}

impl CommonError {
    /// Error carrying one or more registry messages
    pub fn with_info(info: Vec<MsgExtendedInfo>) -> Self {
        Self {
            error: ErrorClass {
                code: GENERAL_ERROR.to_string(),
                message: SEE_EXTENDED_INFO.to_string(),
                extended_info: info,
            },
        }
    }

    /// Generic internal failure; the message is the only detail exposed
    pub fn general(message: impl Into<String>) -> Self {
        Self {
            error: ErrorClass {
                code: GENERAL_ERROR.to_string(),
                message: message.into(),
                extended_info: Vec::new(),
            },
        }
    }
}

fn message(
    message_id: &str,
    text: String,
    args: Vec<Value>,
    severity: &str,
    resolution: &str,
) -> MsgExtendedInfo {
    MsgExtendedInfo {
        odata_type: MESSAGE_ODATA_TYPE.to_string(),
        message_id: message_id.to_string(),
        message: text,
        message_args: args,
        severity: severity.to_string(),
        resolution: resolution.to_string(),
    }
}

// =============================================================================
// Message Constructors
// =============================================================================

pub fn malformed_json(reason: &str) -> MsgExtendedInfo {
    message(
        MALFORMED_JSON,
        format!(
            "The request body submitted was malformed JSON and could not be parsed by the receiving service: {}",
            reason
        ),
        vec![],
        "Critical",
        "Ensure that the request body is valid JSON and resubmit the request.",
    )
}

pub fn property_missing(property: &str, detail: &str) -> MsgExtendedInfo {
    message(
        PROPERTY_MISSING,
        format!(
            "The property {} is a required property and must be included in the request: {}",
            property, detail
        ),
        vec![property.into()],
        "Warning",
        "Ensure that the property is in the request body and has a valid value and resubmit the request if the operation failed.",
    )
}

pub fn property_value_not_in_list(value: &str, property: &str, detail: &str) -> MsgExtendedInfo {
    message(
        PROPERTY_VALUE_NOT_IN_LIST,
        format!(
            "The value {} for the property {} is not in the list of acceptable values. {}",
            value, property, detail
        ),
        vec![value.into(), property.into()],
        "Warning",
        "Choose a value from the enumeration list that the implementation can support and resubmit the request if the operation failed.",
    )
}

pub fn property_value_conflict(property: &str, conflicting: &str, detail: &str) -> MsgExtendedInfo {
    message(
        PROPERTY_VALUE_CONFLICT,
        format!(
            "The property '{}' could not be written because its value would conflict with the value of the '{}' property: {}",
            property, conflicting, detail
        ),
        vec![property.into(), conflicting.into()],
        "Warning",
        "No resolution is required.",
    )
}

pub fn resource_not_found(kind: &str, name: &str, detail: &str) -> MsgExtendedInfo {
    message(
        RESOURCE_NOT_FOUND,
        format!(
            "The requested resource of type {} named {} was not found: {}",
            kind, name, detail
        ),
        vec![kind.into(), name.into()],
        "Critical",
        "Provide a valid resource identifier and resubmit the request.",
    )
}

pub fn resource_in_use(detail: &str) -> MsgExtendedInfo {
    message(
        RESOURCE_IN_USE,
        format!(
            "The change to the requested resource failed because the resource is in use or in transition: {}",
            detail
        ),
        vec![],
        "Warning",
        "Remove the condition and resubmit the request if the operation failed.",
    )
}

pub fn resource_already_exists(
    kind: &str,
    property: &str,
    value: &str,
    detail: &str,
) -> MsgExtendedInfo {
    message(
        RESOURCE_ALREADY_EXISTS,
        format!(
            "The requested resource of type {} with the property {} with the value {} already exists. {}",
            kind, property, value, detail
        ),
        vec![kind.into(), property.into(), value.into()],
        "Critical",
        "Do not repeat the create operation as the resource has already been created.",
    )
}
