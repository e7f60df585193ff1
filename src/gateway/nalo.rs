use flow_message::Response;
use serde::{Deserialize, Serialize};

use super::{Gateway, GatewayError, normalize_msisdn};
use crate::context::{Platform, RequestInfo};
use crate::render::render_ussd;

/// Inbound Nalo USSD callback.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "UPPERCASE")]
pub struct NaloRequest {
    pub userid: String,
    pub msisdn: String,
    /// The dialled code on the first request, the typed reply afterwards.
    #[serde(default)]
    pub userdata: String,
    /// `true` on the first request of a USSD session.
    pub msgtype: bool,
    pub sessionid: String,
    #[serde(default)]
    pub network: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "UPPERCASE")]
pub struct NaloReply {
    pub userid: String,
    pub msisdn: String,
    pub msg: String,
    /// `true` keeps the session open for another reply.
    pub msgtype: bool,
}

#[derive(Debug, Clone)]
pub struct NaloGateway {
    name: String,
}

impl Default for NaloGateway {
    fn default() -> Self {
        Self { name: "nalo".into() }
    }
}

impl NaloGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn parse_json(&self, body: &str) -> Result<RequestInfo, GatewayError> {
        self.parse(serde_json::from_str(body)?)
    }
}

impl Gateway for NaloGateway {
    type Request = NaloRequest;
    type Reply = NaloReply;

    fn name(&self) -> &str {
        &self.name
    }

    fn platform(&self) -> Platform {
        Platform::Ussd
    }

    fn parse(&self, request: NaloRequest) -> Result<RequestInfo, GatewayError> {
        if request.sessionid.trim().is_empty() {
            return Err(GatewayError::MissingField("SESSIONID"));
        }
        if request.msisdn.trim().is_empty() {
            return Err(GatewayError::MissingField("MSISDN"));
        }

        let mut info = RequestInfo::new(request.sessionid, self.name.clone(), Platform::Ussd)
            .with_msisdn(normalize_msisdn(&request.msisdn));
        info.message_id = Some(request.userid);
        if !request.msgtype {
            info.input = Some(request.userdata);
        }
        Ok(info)
    }

    fn reply(&self, request: &RequestInfo, response: Response) -> Result<NaloReply, GatewayError> {
        Ok(NaloReply {
            userid: request.message_id.clone().unwrap_or_default(),
            msisdn: request.msisdn.clone().unwrap_or_default(),
            msg: render_ussd(&response.message, response.choices.as_ref(), response.media.as_ref()),
            msgtype: !response.is_terminal(),
        })
    }
}
