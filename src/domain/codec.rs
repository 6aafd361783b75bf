//! Build code codec.
//!
//! Build codes are passive tree URLs as exported by the game's website and
//! most planners:
//!
//! ```text
//! https://www.pathofexile.com/passive-skill-tree/[3.25.0/]<payload>
//! https://www.pathofexile.com/atlas-skill-tree/<payload>
//! ```
//!
//! The payload is URL-safe base64 (padding optional):
//!
//! ```text
//! u32be version | u8 class | u8 ascendancy
//! v4:  u8 fullscreen | u16be node ids until the end
//! v5+: u8 n | n × u16be nodes | u8 c | c × u16be cluster nodes
//!      | u8 m | m × (u16be effect, u16be node)   (v6 only)
//! ```

use std::sync::OnceLock;

use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig};
use base64::engine::DecodePaddingMode;
use base64::Engine as _;
use regex::Regex;

use crate::domain::entities::{NodeId, NodeSet, TreeType};
use crate::domain::error::DomainError;

/// Result type for codec operations.
pub type CodecResult<T> = Result<T, DomainError>;

pub const CHARACTER_TREE_URL: &str = "https://www.pathofexile.com/passive-skill-tree/";
pub const ATLAS_TREE_URL: &str = "https://www.pathofexile.com/atlas-skill-tree/";

const ENCODE_VERSION: u32 = 6;

const PAYLOAD_ENGINE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new()
        .with_encode_padding(false)
        .with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

fn url_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(
            r"^(?:https?://[^/]+/)?(?:fullscreen-)?(passive-skill-tree|atlas-skill-tree)/(?:[0-9][0-9._]*/)?([A-Za-z0-9_\-]+=*)$",
        )
        .expect("build code pattern is valid")
    })
}

/// Decoded build code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedBuild {
    pub tree: TreeType,
    pub nodes: NodeSet,
    pub version: u32,
    pub class_id: u8,
    pub ascendancy_id: u8,
}

/// Strip account/character query parameters some sites append.
pub fn strip_account_query(code: &str) -> &str {
    let code = code.split("?accountName").next().unwrap_or(code);
    code.split("?characterName").next().unwrap_or(code).trim()
}

struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn take(&mut self, n: usize) -> CodecResult<&'a [u8]> {
        let end = self.pos + n;
        if end > self.bytes.len() {
            return Err(DomainError::TruncatedPayload {
                expected: end,
                actual: self.bytes.len(),
            });
        }
        let slice = &self.bytes[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn u8(&mut self) -> CodecResult<u8> {
        Ok(self.take(1)?[0])
    }

    fn u16(&mut self) -> CodecResult<u16> {
        let b = self.take(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    fn u32(&mut self) -> CodecResult<u32> {
        let b = self.take(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn remaining(&self) -> usize {
        self.bytes.len() - self.pos
    }
}

/// Decode a build code into its node set and tree type.
///
/// Fails rather than returning a partial set on any malformed input.
pub fn decode(code: &str) -> CodecResult<DecodedBuild> {
    let cleaned = strip_account_query(code);
    let caps = url_pattern()
        .captures(cleaned)
        .ok_or_else(|| DomainError::UnrecognizedBuildCode(cleaned.to_string()))?;

    let tree = if &caps[1] == "atlas-skill-tree" {
        TreeType::Atlas
    } else {
        TreeType::Character
    };
    let bytes = PAYLOAD_ENGINE
        .decode(caps[2].as_bytes())
        .map_err(|e| DomainError::InvalidEncoding(e.to_string()))?;

    let mut reader = Reader::new(&bytes);
    let version = reader.u32()?;
    let class_id = reader.u8()?;
    let ascendancy_id = reader.u8()?;

    let nodes = match version {
        4 => {
            let _fullscreen = reader.u8()?;
            if reader.remaining() % 2 != 0 {
                return Err(DomainError::TrailingBytes(1));
            }
            let mut nodes = NodeSet::new();
            while reader.remaining() > 0 {
                nodes.insert(reader.u16()?);
            }
            nodes
        }
        5 | 6 => {
            let count = reader.u8()? as usize;
            let mut nodes = NodeSet::new();
            for _ in 0..count {
                nodes.insert(reader.u16()?);
            }
            if reader.remaining() > 0 {
                let clusters = reader.u8()? as usize;
                reader.take(clusters * 2)?;
            }
            if version == 6 && reader.remaining() > 0 {
                let masteries = reader.u8()? as usize;
                reader.take(masteries * 4)?;
            }
            if reader.remaining() > 0 {
                return Err(DomainError::TrailingBytes(reader.remaining()));
            }
            nodes
        }
        other => return Err(DomainError::UnsupportedVersion(other)),
    };

    Ok(DecodedBuild {
        tree,
        nodes,
        version,
        class_id,
        ascendancy_id,
    })
}

/// Encode a node set as a version 6 build code for the given tree.
pub fn encode(nodes: &NodeSet, tree: TreeType) -> CodecResult<String> {
    let count = u8::try_from(nodes.len()).map_err(|_| DomainError::TooManyNodes(nodes.len()))?;

    let mut bytes = Vec::with_capacity(10 + nodes.len() * 2);
    bytes.extend_from_slice(&ENCODE_VERSION.to_be_bytes());
    bytes.push(0); // class
    bytes.push(0); // ascendancy
    bytes.push(count);
    for id in nodes {
        bytes.extend_from_slice(&id.to_be_bytes());
    }
    bytes.push(0); // cluster nodes
    bytes.push(0); // mastery effects

    let prefix = match tree {
        TreeType::Character => CHARACTER_TREE_URL,
        TreeType::Atlas => ATLAS_TREE_URL,
    };
    Ok(format!("{}{}", prefix, PAYLOAD_ENGINE.encode(bytes)))
}

/// Whether `code` decodes at all.
pub fn is_valid(code: &str) -> bool {
    !code.trim().is_empty() && decode(code).is_ok()
}

/// Node ids listed in a decoded build, in ascending order.
pub fn node_list(build: &DecodedBuild) -> Vec<NodeId> {
    build.nodes.iter().copied().collect()
}
