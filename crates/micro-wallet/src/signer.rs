//! Signing collaborators.
//!
//! The wallet never holds private keys. A [`Signer`] takes an unsigned
//! transaction and hands back a signed one; whatever comes back is checked
//! against what was asked for before anyone broadcasts it.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use bitcoin::consensus::encode;
use bitcoin::Transaction;
use micro_core::error::SignerError;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

use crate::builder::UnsignedTransaction;
use crate::portable::to_portable;

/// Produces signed transactions from unsigned ones.
#[async_trait]
pub trait Signer: Send + Sync {
    async fn sign(&self, tx: &UnsignedTransaction) -> Result<Transaction, SignerError>;
}

/// Check that `signed` is `unsigned` with signatures filled in.
///
/// Version, lock time, outpoints, sequences and outputs must all match and
/// every input must carry a script sig or witness.
pub fn verify_signed(unsigned: &UnsignedTransaction, signed: &Transaction) -> Result<(), SignerError> {
    let expected = unsigned.to_bitcoin_tx();
    if signed.version != expected.version || signed.lock_time != expected.lock_time {
        return Err(SignerError::Mismatch("version or lock time changed".into()));
    }
    if signed.input.len() != expected.input.len() {
        return Err(SignerError::Mismatch(format!(
            "{} inputs, expected {}",
            signed.input.len(),
            expected.input.len()
        )));
    }
    for (index, (got, want)) in signed.input.iter().zip(&expected.input).enumerate() {
        if got.previous_output != want.previous_output || got.sequence != want.sequence {
            return Err(SignerError::Mismatch(format!("input {index} spends {}", got.previous_output)));
        }
        if got.script_sig.is_empty() && got.witness.is_empty() {
            return Err(SignerError::Mismatch(format!("input {index} is not signed")));
        }
    }
    if signed.output != expected.output {
        return Err(SignerError::Mismatch("outputs differ".into()));
    }
    Ok(())
}

/// Signs by running an external program.
///
/// The program receives the portable JSON on stdin and must print the signed
/// raw transaction as hex on stdout. A non-zero exit is a rejection; its
/// stderr becomes the message.
#[derive(Debug, Clone)]
pub struct CommandSigner {
    program: PathBuf,
    args: Vec<String>,
    timeout: Duration,
}

impl CommandSigner {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            timeout: Duration::from_secs(300),
        }
    }

    pub fn args(mut self, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Signing may wait on a human pressing a button; the default is generous.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    async fn run(&self, input: Vec<u8>) -> Result<std::process::Output, SignerError> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| SignerError::Unavailable(format!("{}: {e}", self.program.display())))?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| SignerError::Unavailable("signer stdin not captured".into()))?;
        // stdin is fed while stdout and stderr drain, so a signer that talks
        // before it has read everything cannot stall on a full pipe
        let feed = async move {
            stdin.write_all(&input).await?;
            stdin.shutdown().await
        };
        let (fed, output) = tokio::join!(feed, child.wait_with_output());
        let output =
            output.map_err(|e| SignerError::Unavailable(format!("waiting for signer: {e}")))?;
        match fed {
            // it stopped reading; the exit status says why
            Err(e) if e.kind() != std::io::ErrorKind::BrokenPipe => {
                Err(SignerError::Unavailable(format!("writing to signer: {e}")))
            }
            _ => Ok(output),
        }
    }
}

#[async_trait]
impl Signer for CommandSigner {
    async fn sign(&self, tx: &UnsignedTransaction) -> Result<Transaction, SignerError> {
        let input = to_portable(tx).map_err(|e| SignerError::Unavailable(e.to_string()))?;
        debug!(program = %self.program.display(), inputs = tx.inputs.len(), "Invoking signer");

        let output = tokio::time::timeout(self.timeout, self.run(input))
            .await
            .map_err(|_| SignerError::Unavailable(format!("no answer within {:?}", self.timeout)))??;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(SignerError::Rejected(format!("{}: {}", output.status, stderr.trim())));
        }
        let stdout = String::from_utf8(output.stdout)
            .map_err(|e| SignerError::InvalidResponse(e.to_string()))?;
        let raw = hex::decode(stdout.trim()).map_err(|e| SignerError::InvalidResponse(e.to_string()))?;
        let signed: Transaction =
            encode::deserialize(&raw).map_err(|e| SignerError::InvalidResponse(e.to_string()))?;

        verify_signed(tx, &signed)?;
        Ok(signed)
    }
}
