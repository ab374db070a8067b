use std::{
    path::PathBuf,
    sync::atomic::{
        AtomicU64,
        Ordering,
    },
};

use tokio::process::Command;
use tracing::debug;

use crate::{
    domain::payload::ContractName,
    ports::prover::{
        ProverError,
        VmRun,
        VmRunner,
    },
};

/// Runs VM programs by shelling out to the `cairo-runner` CLI.
///
/// Each run gets its own directory under `work_dir`:
/// 1. Writes the argument string to `inputs.txt`
/// 2. Runs `cairo-runner <program> <inputs> <trace> <memory> <output> <sierra>`
/// 3. Reads back the trace, memory and output files
pub struct CairoRunner {
    binary: PathBuf,
    work_dir: PathBuf,
    smile_program: PathBuf,
    smile_token_program: PathBuf,
    runs: AtomicU64,
}

impl CairoRunner {
    pub fn new(
        binary: PathBuf,
        work_dir: PathBuf,
        smile_program: PathBuf,
        smile_token_program: PathBuf,
    ) -> Self {
        Self {
            binary,
            work_dir,
            smile_program,
            smile_token_program,
            runs: AtomicU64::new(0),
        }
    }

    fn program_path(&self, program: ContractName) -> Result<&PathBuf, ProverError> {
        match program {
            ContractName::Smile => Ok(&self.smile_program),
            ContractName::SmileToken => Ok(&self.smile_token_program),
            ContractName::EcdsaSecp256r1 => Err(ProverError::RunFailed(format!(
                "{program} is a circuit, not a VM program"
            ))),
        }
    }
}

impl VmRunner for CairoRunner {
    async fn run(&self, program: ContractName, args: &str) -> Result<VmRun, ProverError> {
        let program_path = self.program_path(program)?;
        let run_id = self.runs.fetch_add(1, Ordering::SeqCst);
        let run_dir = self.work_dir.join(format!("{program}-{run_id}"));
        tokio::fs::create_dir_all(&run_dir).await?;

        let inputs = run_dir.join("inputs.txt");
        let trace = run_dir.join("trace.bin");
        let memory = run_dir.join("memory.bin");
        let output = run_dir.join("output.txt");
        let sierra = run_dir.join("program.sierra.json");
        tokio::fs::write(&inputs, args).await?;

        debug!(%program, dir = %run_dir.display(), "running VM program");
        let status = Command::new(&self.binary)
            .arg(program_path)
            .arg(&inputs)
            .arg(&trace)
            .arg(&memory)
            .arg(&output)
            .arg(&sierra)
            .output()
            .await?;

        if !status.status.success() {
            let stderr = String::from_utf8_lossy(&status.stderr);
            return Err(ProverError::RunFailed(format!(
                "{} exited with {}: {stderr}",
                self.binary.display(),
                status.status
            )));
        }

        Ok(VmRun {
            output: tokio::fs::read_to_string(&output).await?.trim().to_string(),
            memory: tokio::fs::read(&memory).await?,
            trace: tokio::fs::read(&trace).await?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_signature_contract_is_not_runnable() {
        let runner = CairoRunner::new(
            "cairo-runner".into(),
            std::env::temp_dir(),
            "smile.json".into(),
            "token.json".into(),
        );
        let err = runner
            .run(ContractName::EcdsaSecp256r1, "")
            .await
            .unwrap_err();
        assert!(matches!(err, ProverError::RunFailed(_)));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_runner_collects_outputs() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        // Fake runner: echoes its inputs into the output file.
        let script = dir.path().join("fake-runner.sh");
        std::fs::write(
            &script,
            "#!/bin/sh\nprintf trace > \"$3\"\nprintf memory > \"$4\"\ncat \"$2\" > \"$5\"\n",
        )
        .unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let runner = CairoRunner::new(
            script,
            dir.path().join("work"),
            "smile.json".into(),
            "token.json".into(),
        );
        let run = runner.run(ContractName::Smile, "1 2 [3]\n").await.unwrap();
        assert_eq!(run.output, "1 2 [3]");
        assert_eq!(run.trace, b"trace");
        assert_eq!(run.memory, b"memory");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_runner_failure_surfaces_stderr() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("failing-runner.sh");
        std::fs::write(&script, "#!/bin/sh\necho 'bad input' >&2\nexit 3\n").unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let runner = CairoRunner::new(
            script,
            dir.path().to_path_buf(),
            "smile.json".into(),
            "token.json".into(),
        );
        match runner.run(ContractName::SmileToken, "").await {
            Err(ProverError::RunFailed(msg)) => assert!(msg.contains("bad input")),
            other => panic!("expected RunFailed, got {other:?}"),
        }
    }
}
