use tracing::{
    debug,
    info,
};

use crate::{
    codec::program::{
        smile_program_args,
        smile_token_program_args,
    },
    domain::{
        payload::ContractName,
        proof::ProofArtifact,
    },
    ports::prover::{
        Prover,
        ProverError,
        ProvingJob,
        SignatureCircuitInput,
        SignatureProver,
        VmProver,
        VmRunner,
        WitnessGenerator,
    },
};

/// Production `Prover`: runs VM programs then sends the run to the VM
/// prover, or builds the circuit witness and sends it to the signature prover.
pub struct PipelineProver<R, V, W, S> {
    runner: R,
    vm_prover: V,
    witness: W,
    signature_prover: S,
}

impl<R, V, W, S> PipelineProver<R, V, W, S>
where
    R: VmRunner,
    V: VmProver,
    W: WitnessGenerator,
    S: SignatureProver,
{
    pub fn new(runner: R, vm_prover: V, witness: W, signature_prover: S) -> Self {
        Self {
            runner,
            vm_prover,
            witness,
            signature_prover,
        }
    }

    async fn prove_vm(
        &self,
        program: ContractName,
        args: String,
    ) -> Result<ProofArtifact, ProverError> {
        let run = self.runner.run(program, &args).await?;
        debug!(%program, output = %run.output, "program ran");
        let proof = self.vm_prover.prove_run(&run).await?;
        Ok(ProofArtifact::new(program, proof, run.output.into_bytes()))
    }
}

impl<R, V, W, S> Prover for PipelineProver<R, V, W, S>
where
    R: VmRunner,
    V: VmProver,
    W: WitnessGenerator,
    S: SignatureProver,
{
    async fn prove(
        &self,
        contract: ContractName,
        job: &ProvingJob,
    ) -> Result<ProofArtifact, ProverError> {
        let combined = job.payloads.combined();
        let artifact = match contract {
            ContractName::Smile => {
                self.prove_vm(contract, smile_program_args(&job.identity, &combined))
                    .await?
            }
            ContractName::SmileToken => {
                self.prove_vm(
                    contract,
                    smile_token_program_args(&job.balances, &combined),
                )
                .await?
            }
            ContractName::EcdsaSecp256r1 => {
                let input = SignatureCircuitInput::from_job(job);
                let witness = self.witness.generate(&input).await?;
                let proof = self.signature_prover.prove_witness(&witness).await?;
                ProofArtifact::new(contract, proof, Vec::new())
            }
        };
        info!(%contract, proof_len = artifact.proof.len(), "proof ready");
        Ok(artifact)
    }
}
