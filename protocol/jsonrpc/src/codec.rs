/*
 * Licensed to the Apache Software Foundation (ASF) under one or more
 * contributor license agreements.  See the NOTICE file distributed with
 * this work for additional information regarding copyright ownership.
 * The ASF licenses this file to You under the Apache License, Version 2.0
 * (the "License"); you may not use this file except in compliance with
 * the License.  You may obtain a copy of the License at
 *
 *     http://www.apache.org/licenses/LICENSE-2.0
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the License for the specific language governing permissions and
 * limitations under the License.
 */

//! Length prefixed JSON frames: a big-endian `u32` length followed by that many bytes of JSON.

use std::{collections::HashMap, io};

use dubbo_rpc::{InvocationFailure, RpcResult};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt};

pub const PAYLOAD_KEY: &str = "payload";

/// Largest frame accepted by default, 8 MiB.
pub const DEFAULT_PAYLOAD: usize = 8 * 1024 * 1024;

#[derive(Error, Debug)]
pub enum CodecError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("invalid json frame: {0}")]
    Json(#[from] serde_json::Error),
    #[error("frame of {size} bytes exceeds the payload limit of {limit} bytes")]
    TooLarge { size: usize, limit: usize },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireRequest {
    pub id: u64,
    /// `group/interface:version` of the exported service.
    pub service_key: String,
    pub service: String,
    pub method: String,
    #[serde(default)]
    pub parameter_types: Vec<String>,
    #[serde(default)]
    pub arguments: Vec<Value>,
    #[serde(default)]
    pub attachments: HashMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireResponse {
    pub id: u64,
    #[serde(default)]
    pub value: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<InvocationFailure>,
    #[serde(default)]
    pub attachments: HashMap<String, String>,
}

impl WireResponse {
    pub fn failure(id: u64, failure: InvocationFailure) -> Self {
        WireResponse {
            id,
            value: Value::Null,
            error: Some(failure),
            attachments: HashMap::new(),
        }
    }

    pub fn from_result(id: u64, result: RpcResult) -> Self {
        let attachments = result.attachments().clone();
        match result.into_outcome() {
            Ok(value) => WireResponse {
                id,
                value,
                error: None,
                attachments,
            },
            Err(err) => WireResponse {
                attachments,
                ..Self::failure(id, err.into_failure())
            },
        }
    }

    pub fn into_result(self) -> RpcResult {
        let outcome = match self.error {
            Some(failure) => Err(failure.into()),
            None => Ok(self.value),
        };
        RpcResult::from_outcome(outcome).with_attachments(self.attachments)
    }
}

/// `message` as one frame, ready to be written.
pub fn encode_frame<T: Serialize>(message: &T, limit: usize) -> Result<Vec<u8>, CodecError> {
    let body = serde_json::to_vec(message)?;
    if body.len() > limit || body.len() > u32::MAX as usize {
        return Err(CodecError::TooLarge {
            size: body.len(),
            limit,
        });
    }
    let mut frame = Vec::with_capacity(body.len() + 4);
    frame.extend_from_slice(&(body.len() as u32).to_be_bytes());
    frame.extend_from_slice(&body);
    Ok(frame)
}

/// The body of the next frame, `None` when the peer closed between frames.
pub async fn read_frame<R>(reader: &mut R, limit: usize) -> Result<Option<Vec<u8>>, CodecError>
where
    R: AsyncRead + Unpin,
{
    let mut len = [0u8; 4];
    match reader.read_exact(&mut len).await {
        Ok(_) => {}
        Err(err) if err.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(err) => return Err(err.into()),
    }
    let size = u32::from_be_bytes(len) as usize;
    if size > limit {
        return Err(CodecError::TooLarge { size, limit });
    }
    let mut body = vec![0u8; size];
    reader.read_exact(&mut body).await?;
    Ok(Some(body))
}

pub fn decode<T: DeserializeOwned>(body: &[u8]) -> Result<T, CodecError> {
    Ok(serde_json::from_slice(body)?)
}

#[cfg(test)]
mod tests {
    use dubbo_rpc::FailureKind;
    use serde_json::json;

    use super::*;

    #[tokio::test]
    async fn test_frames_on_a_stream() {
        let request = WireRequest {
            id: 7,
            service_key: "demo/demo.Greeter:1.0".to_string(),
            service: "demo.Greeter".to_string(),
            method: "greet".to_string(),
            parameter_types: vec!["string".to_string()],
            arguments: vec![json!("world")],
            attachments: HashMap::new(),
        };
        let mut bytes = encode_frame(&request, DEFAULT_PAYLOAD).unwrap();
        bytes.extend(encode_frame(&WireResponse::failure(7, InvocationFailure::timeout("late")), DEFAULT_PAYLOAD).unwrap());

        let mut reader = &bytes[..];
        let first = read_frame(&mut reader, DEFAULT_PAYLOAD).await.unwrap().unwrap();
        assert_eq!(decode::<WireRequest>(&first).unwrap(), request);
        let second = read_frame(&mut reader, DEFAULT_PAYLOAD).await.unwrap().unwrap();
        let result = decode::<WireResponse>(&second).unwrap().into_result();
        assert_eq!(result.failure().map(|f| f.kind), Some(FailureKind::Timeout));
        assert!(read_frame(&mut reader, DEFAULT_PAYLOAD).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_payload_limit() {
        let frame = encode_frame(&json!({"data": "x".repeat(64)}), 1024).unwrap();
        assert!(matches!(
            encode_frame(&json!({"data": "x".repeat(64)}), 16),
            Err(CodecError::TooLarge { limit: 16, .. })
        ));
        let mut reader = &frame[..];
        assert!(matches!(
            read_frame(&mut reader, 16).await,
            Err(CodecError::TooLarge { .. })
        ));
    }
}
