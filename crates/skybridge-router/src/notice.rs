//! Text protocol spoken with the network simulator.
//!
//! Inbound progress notices: `"<src> <dst> <SEND|RECV> <size> [<flow id>]"`.
//! Outbound directives: `"<flow id> SEND <size> <dst>"`.

use std::fmt;
use std::str::FromStr;

use crate::error::{Result, RouterError};
use crate::flow::FlowId;

/// Direction of a progress notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowOp {
    Send,
    Recv,
}

/// One parsed progress notice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressNotice {
    pub src: String,
    pub dst: String,
    pub op: FlowOp,
    pub size: u64,
    pub flow_id: Option<FlowId>,
}

fn malformed(notice: &str, reason: impl Into<String>) -> RouterError {
    RouterError::Malformed {
        notice: notice.to_string(),
        reason: reason.into(),
    }
}

impl FromStr for ProgressNotice {
    type Err = RouterError;

    fn from_str(line: &str) -> Result<Self> {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        if !(4..=5).contains(&tokens.len()) {
            return Err(malformed(
                line,
                format!("expected 4 or 5 tokens, got {}", tokens.len()),
            ));
        }

        let op = match tokens[2] {
            "SEND" => FlowOp::Send,
            "RECV" => FlowOp::Recv,
            other => {
                return Err(RouterError::UnknownOp {
                    notice: line.to_string(),
                    op: other.to_string(),
                })
            }
        };

        let size = tokens[3]
            .parse::<u64>()
            .map_err(|e| malformed(line, format!("bad size {:?}: {e}", tokens[3])))?;

        let flow_id = tokens
            .get(4)
            .map(|raw| {
                raw.parse::<u64>()
                    .map(FlowId)
                    .map_err(|e| malformed(line, format!("bad flow id {raw:?}: {e}")))
            })
            .transpose()?;

        if op == FlowOp::Send && flow_id.is_none() {
            return Err(malformed(line, "SEND notice needs a flow id"));
        }

        Ok(Self {
            src: tokens[0].to_string(),
            dst: tokens[1].to_string(),
            op,
            size,
            flow_id,
        })
    }
}

/// Instruction to the network simulator to start moving a flow's bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Directive {
    pub flow_id: FlowId,
    pub size: u64,
    pub dst: String,
}

impl fmt::Display for Directive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} SEND {} {}", self.flow_id, self.size, self.dst)
    }
}
