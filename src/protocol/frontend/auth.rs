//! Authentication messages and the SCRAM-SHA-256 exchange helper.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};

use crate::protocol::codec::MessageBuilder;

/// Write a PasswordMessage (cleartext or MD5-hashed password).
pub fn write_password(buf: &mut Vec<u8>, password: &str) {
    let mut msg = MessageBuilder::new(buf, super::msg_type::PASSWORD);
    msg.write_cstr(password);
    msg.finish();
}

/// Compute the MD5 password hash.
///
/// PostgreSQL MD5 password format: "md5" + md5(md5(password + username) + salt)
pub fn md5_password(username: &str, password: &str, salt: &[u8; 4]) -> String {
    use md5::{Digest, Md5};

    let mut hasher = Md5::new();
    hasher.update(password.as_bytes());
    hasher.update(username.as_bytes());
    let inner = format!("{:x}", hasher.finalize());

    let mut hasher = Md5::new();
    hasher.update(inner.as_bytes());
    hasher.update(salt);
    format!("md5{:x}", hasher.finalize())
}

/// Write a SASLInitialResponse message.
pub fn write_sasl_initial_response(buf: &mut Vec<u8>, mechanism: &str, initial_response: &[u8]) {
    let mut msg = MessageBuilder::new(buf, super::msg_type::PASSWORD);
    msg.write_cstr(mechanism);
    msg.write_i32(initial_response.len() as i32);
    msg.write_bytes(initial_response);
    msg.finish();
}

/// Write a SASLResponse message.
pub fn write_sasl_response(buf: &mut Vec<u8>, response: &[u8]) {
    let mut msg = MessageBuilder::new(buf, super::msg_type::PASSWORD);
    msg.write_bytes(response);
    msg.finish();
}

/// SCRAM-SHA-256 client exchange.
///
/// The engine feeds server messages in and sends the produced client
/// messages back; the crypto lives entirely here.
pub struct ScramClient {
    nonce: String,
    gs2_header: String,
    password: String,
    auth_message: Option<String>,
    salted_password: Option<[u8; 32]>,
}

impl ScramClient {
    /// Create a new SCRAM client without channel binding.
    pub fn new(password: &str) -> Self {
        use rand::Rng;

        let mut nonce_bytes = [0u8; 24];
        rand::rng().fill(&mut nonce_bytes);

        Self {
            nonce: BASE64.encode(nonce_bytes),
            gs2_header: "n,,".to_string(),
            password: password.to_string(),
            auth_message: None,
            salted_password: None,
        }
    }

    #[cfg(test)]
    fn with_nonce(password: &str, nonce: &str) -> Self {
        Self {
            nonce: nonce.to_string(),
            gs2_header: "n,,".to_string(),
            password: password.to_string(),
            auth_message: None,
            salted_password: None,
        }
    }

    /// The client-first-message.
    ///
    /// The username is empty; PostgreSQL takes it from the startup
    /// message instead.
    pub fn client_first_message(&self) -> String {
        format!("{}n=,r={}", self.gs2_header, self.nonce)
    }

    fn client_first_message_bare(&self) -> String {
        format!("n=,r={}", self.nonce)
    }

    /// Process the server-first-message, producing the client-final-message.
    pub fn process_server_first(&mut self, server_first: &str) -> Result<String, String> {
        use pbkdf2::pbkdf2_hmac;

        let mut combined_nonce = None;
        let mut salt_b64 = None;
        let mut iterations = None;
        for part in server_first.split(',') {
            if let Some(value) = part.strip_prefix("r=") {
                combined_nonce = Some(value);
            } else if let Some(value) = part.strip_prefix("s=") {
                salt_b64 = Some(value);
            } else if let Some(value) = part.strip_prefix("i=") {
                iterations = value.parse::<u32>().ok();
            }
        }

        let combined_nonce = combined_nonce.ok_or("missing nonce in server-first-message")?;
        let salt_b64 = salt_b64.ok_or("missing salt in server-first-message")?;
        let iterations = iterations.ok_or("missing iteration count in server-first-message")?;

        if !combined_nonce.starts_with(&self.nonce) {
            return Err("server nonce does not extend the client nonce".to_string());
        }

        let salt = BASE64
            .decode(salt_b64)
            .map_err(|e| format!("invalid salt: {e}"))?;

        // SaltedPassword = Hi(password, salt, i)
        let mut salted_password = [0u8; 32];
        pbkdf2_hmac::<Sha256>(
            self.password.as_bytes(),
            &salt,
            iterations,
            &mut salted_password,
        );
        self.salted_password = Some(salted_password);

        // ClientKey = HMAC(SaltedPassword, "Client Key"); StoredKey = H(ClientKey)
        let client_key = hmac_sha256(&salted_password, b"Client Key")?;
        let stored_key = Sha256::digest(client_key);

        let channel_binding = BASE64.encode(self.gs2_header.as_bytes());
        let client_final_without_proof = format!("c={channel_binding},r={combined_nonce}");

        let auth_message = format!(
            "{},{},{}",
            self.client_first_message_bare(),
            server_first,
            client_final_without_proof
        );

        // ClientProof = ClientKey XOR HMAC(StoredKey, AuthMessage)
        let client_signature = hmac_sha256(&stored_key, auth_message.as_bytes())?;
        self.auth_message = Some(auth_message);

        let mut client_proof = [0u8; 32];
        for (out, (key, sig)) in client_proof
            .iter_mut()
            .zip(client_key.iter().zip(client_signature.iter()))
        {
            *out = key ^ sig;
        }

        Ok(format!(
            "{client_final_without_proof},p={}",
            BASE64.encode(client_proof)
        ))
    }

    /// Verify the server-final-message signature.
    pub fn verify_server_final(&self, server_final: &str) -> Result<(), String> {
        let server_signature_b64 = server_final
            .strip_prefix("v=")
            .ok_or("invalid server-final-message")?;
        let server_signature = BASE64
            .decode(server_signature_b64)
            .map_err(|e| format!("invalid server signature: {e}"))?;

        let salted_password = self
            .salted_password
            .as_ref()
            .ok_or("server-final-message before server-first-message")?;
        let auth_message = self
            .auth_message
            .as_ref()
            .ok_or("server-final-message before server-first-message")?;

        // ServerSignature = HMAC(HMAC(SaltedPassword, "Server Key"), AuthMessage)
        let server_key = hmac_sha256(salted_password, b"Server Key")?;
        let expected = hmac_sha256(&server_key, auth_message.as_bytes())?;

        if server_signature.as_slice() != expected.as_slice() {
            return Err("server signature verification failed".to_string());
        }
        Ok(())
    }
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> Result<[u8; 32], String> {
    let mut mac =
        <Hmac<Sha256> as Mac>::new_from_slice(key).map_err(|e| format!("HMAC error: {e}"))?;
    mac.update(data);
    Ok(mac.finalize().into_bytes().into())
}
