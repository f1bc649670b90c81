use std::fmt;

use alloy::{
    dyn_abi::{DynSolType, DynSolValue, Specifier},
    json_abi::{Function, JsonAbi, Param},
    primitives::{Address, Bytes, U256},
};
use eyre::{Result, WrapErr, eyre};
use serde_json::Value;

/// Compiled contract: interface plus creation bytecode when the artifact carries it
#[derive(Debug, Clone)]
pub struct ContractArtifact {
    pub name: String,
    pub abi: JsonAbi,
    pub bytecode: Option<Bytes>,
}

/// Parse a Foundry, Hardhat or Remix artifact, or a bare ABI array
pub fn parse_artifact(name: &str, artifact: &Value) -> Result<ContractArtifact> {
    let abi_json = if artifact.is_array() {
        artifact
    } else {
        artifact
            .get("abi")
            .ok_or_else(|| eyre!("Artifact for {} has no abi field", name))?
    };

    let abi: JsonAbi = serde_json::from_value(abi_json.clone())
        .wrap_err_with(|| format!("Failed to parse ABI of {}", name))?;

    let bytecode = match extract_bytecode(artifact) {
        Some(hex_str) => decode_bytecode(name, hex_str)?,
        None => None,
    };

    Ok(ContractArtifact {
        name: name.to_string(),
        abi,
        bytecode,
    })
}

/// Parse an artifact from its JSON text
pub fn parse_artifact_str(name: &str, content: &str) -> Result<ContractArtifact> {
    let artifact: Value =
        serde_json::from_str(content).wrap_err("Failed to parse artifact as JSON")?;
    parse_artifact(name, &artifact)
}

fn extract_bytecode(artifact: &Value) -> Option<&str> {
    // Foundry: bytecode.object, Hardhat: bytecode, Remix: data.bytecode.object
    artifact
        .get("bytecode")
        .and_then(|b| b.get("object").or(Some(b)))
        .and_then(Value::as_str)
        .or_else(|| {
            artifact
                .pointer("/data/bytecode/object")
                .and_then(Value::as_str)
        })
}

fn decode_bytecode(name: &str, hex_str: &str) -> Result<Option<Bytes>> {
    let clean = hex_str.strip_prefix("0x").unwrap_or(hex_str);
    if clean.is_empty() {
        return Ok(None);
    }
    if clean.contains("__") {
        return Err(eyre!("Bytecode of {} has unlinked library references", name));
    }

    let bytes = hex::decode(clean).wrap_err_with(|| format!("Invalid bytecode for {}", name))?;
    Ok(Some(Bytes::from(bytes)))
}

/// Pick the overload of `name` that takes `arg_count` inputs
pub fn find_function<'a>(abi: &'a JsonAbi, name: &str, arg_count: usize) -> Result<&'a Function> {
    let overloads = abi
        .function(name)
        .ok_or_else(|| eyre!("Function {} not found in ABI", name))?;

    overloads
        .iter()
        .find(|f| f.inputs.len() == arg_count)
        .ok_or_else(|| {
            eyre!(
                "No overload of {} takes {} argument(s)",
                name,
                arg_count
            )
        })
}

/// Coerce textual arguments into typed values following the ABI parameters
pub fn coerce_args(params: &[Param], args: &[String]) -> Result<Vec<DynSolValue>> {
    if params.len() != args.len() {
        return Err(eyre!(
            "Expected {} argument(s), got {}",
            params.len(),
            args.len()
        ));
    }

    params
        .iter()
        .zip(args)
        .map(|(param, arg)| {
            let ty: DynSolType = param
                .resolve()
                .wrap_err_with(|| format!("Unsupported parameter type {}", param.ty))?;
            ty.coerce_str(arg)
                .wrap_err_with(|| format!("Cannot read {:?} as {}", arg, param.ty))
        })
        .collect()
}

/// Decoded return values of a read call
#[derive(Debug, Clone, PartialEq)]
pub struct CallValue(pub Vec<DynSolValue>);

impl CallValue {
    pub fn first(&self) -> Option<&DynSolValue> {
        self.0.first()
    }

    pub fn get(&self, index: usize) -> Option<&DynSolValue> {
        self.0.get(index)
    }

    /// The first return value as an address, if it is one
    pub fn as_address(&self) -> Option<Address> {
        self.first().and_then(DynSolValue::as_address)
    }
}

impl fmt::Display for CallValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(format_value).collect();
        write!(f, "{}", parts.join(", "))
    }
}

/// Render a value the way a console user expects to read it
pub fn format_value(value: &DynSolValue) -> String {
    match value {
        DynSolValue::Bool(b) => b.to_string(),
        DynSolValue::Int(i, _) => i.to_string(),
        DynSolValue::Uint(u, _) => u.to_string(),
        DynSolValue::Address(a) => a.to_checksum(None),
        DynSolValue::FixedBytes(word, size) => format!("0x{}", hex::encode(&word[..*size])),
        DynSolValue::Bytes(b) => format!("0x{}", hex::encode(b)),
        DynSolValue::String(s) => s.clone(),
        DynSolValue::Array(items) | DynSolValue::FixedArray(items) => items
            .iter()
            .map(format_value)
            .collect::<Vec<_>>()
            .join(","),
        DynSolValue::Tuple(items) => format!(
            "({})",
            items.iter().map(format_value).collect::<Vec<_>>().join(", ")
        ),
        other => format!("{:?}", other),
    }
}

/// Render an integer stored as fixed point (value * scale) as a decimal
///
/// Non-integer values fall back to [`format_value`].
pub fn format_scaled(value: &DynSolValue, scale: u64) -> String {
    let (negative, magnitude) = match value {
        DynSolValue::Uint(u, _) => (false, *u),
        DynSolValue::Int(i, _) => (i.is_negative(), i.unsigned_abs()),
        other => return format_value(other),
    };

    let scale_u = U256::from(scale);
    let whole = magnitude / scale_u;
    let frac = magnitude % scale_u;
    let sign = if negative { "-" } else { "" };

    if frac.is_zero() || scale <= 1 {
        return format!("{}{}", sign, whole);
    }

    let digits = scale.to_string().len() - 1;
    let frac_str = format!("{:0>width$}", frac.to_string(), width = digits);
    format!("{}{}.{}", sign, whole, frac_str.trim_end_matches('0'))
}

/// Render every element of an array value with [`format_scaled`]
pub fn format_scaled_list(value: &DynSolValue, scale: u64) -> String {
    match value.as_array() {
        Some(items) => items
            .iter()
            .map(|v| format_scaled(v, scale))
            .collect::<Vec<_>>()
            .join(","),
        None => format_scaled(value, scale),
    }
}
