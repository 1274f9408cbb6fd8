// SPDX-License-Identifier: Apache-2.0

//! Types for the fragment planner.

use std::collections::BTreeMap;
use std::fmt;

use fedbridge_core::SourceLocator;
use serde::{Deserialize, Serialize};

/// One independently readable unit of an external dataset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fragment {
    /// Position in the storage layer's enumeration order
    pub index: usize,
    /// File path and byte range of the unit
    pub source: SourceLocator,
    /// Candidate hosts holding the unit; empty means "any"
    pub hosts: Vec<String>,
    /// Serialized [`FragmentUserData`]; opaque to the scan scheduler
    pub user_data: Vec<u8>,
}

impl Fragment {
    /// Decodes the reader context carried by this fragment.
    pub fn decode_user_data(&self) -> serde_json::Result<FragmentUserData> {
        FragmentUserData::decode(&self.user_data)
    }
}

/// Partition key value derived from a storage unit's location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionKey {
    pub name: String,
    pub native_type: String,
    pub value: String,
}

/// Everything a reader needs to decode one fragment without consulting the
/// catalog again.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FragmentUserData {
    pub input_format: String,
    pub serde: String,
    pub partition_keys: Vec<PartitionKey>,
    /// Only present under [`FragmenterProfile::Full`]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub serde_properties: Option<BTreeMap<String, String>>,
}

impl FragmentUserData {
    pub fn encode(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }

    pub fn decode(bytes: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(bytes)
    }
}

/// What each fragment's user data carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FragmenterProfile {
    /// Input format, serde, partition keys and the serde properties
    #[default]
    Full,
    /// Input format, serde and partition keys only. Keeps per-fragment
    /// metadata small for wide tables; restricted to [`InputFormat`] formats.
    InputFormat,
}

/// Input formats readable under [`FragmenterProfile::InputFormat`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputFormat {
    RcFile,
    TextFile,
    OrcFile,
}

impl InputFormat {
    pub const ALL: [InputFormat; 3] = [InputFormat::RcFile, InputFormat::TextFile, InputFormat::OrcFile];

    /// Recognises an input format from its fully-qualified class name.
    pub fn from_class_name(class_name: &str) -> Option<Self> {
        match class_name.rsplit('.').next().unwrap_or(class_name) {
            "RCFileInputFormat" => Some(InputFormat::RcFile),
            "TextInputFormat" => Some(InputFormat::TextFile),
            "OrcInputFormat" => Some(InputFormat::OrcFile),
            _ => None,
        }
    }

    pub fn class_name(&self) -> &'static str {
        match self {
            InputFormat::RcFile => "org.apache.hadoop.hive.ql.io.RCFileInputFormat",
            InputFormat::TextFile => "org.apache.hadoop.mapred.TextInputFormat",
            InputFormat::OrcFile => "org.apache.hadoop.hive.ql.io.orc.OrcInputFormat",
        }
    }
}

impl fmt::Display for InputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            InputFormat::RcFile => "RC_FILE_INPUT_FORMAT",
            InputFormat::TextFile => "TEXT_FILE_INPUT_FORMAT",
            InputFormat::OrcFile => "ORC_FILE_INPUT_FORMAT",
        };
        f.write_str(name)
    }
}

/// Options for a planning call.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PlanOptions {
    pub profile: Option<FragmenterProfile>,
}

impl PlanOptions {
    pub fn effective_profile(&self) -> FragmenterProfile {
        self.profile.unwrap_or_default()
    }
}
