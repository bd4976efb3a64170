//! Deterministic, offline risk score used to triage a compiled contract
//! before a human or the static analyzer looks at it. Pure function of
//! the compiled artifact, capped at 100.

use ethers::abi::Abi;

pub fn risk_score(bytecode: &[u8], abi: &Abi) -> u8 {
	let mut score: u32 = 0;

	score += match bytecode.len() {
		n if n > 24_000 => 30,
		n if n > 12_000 => 20,
		n if n > 6_000 => 10,
		_ => 0,
	};

	let function_count = abi.functions().count();
	score += match function_count {
		n if n > 40 => 25,
		n if n > 20 => 15,
		n if n > 10 => 5,
		_ => 0,
	};

	let payable_count = abi.functions().filter(|f| f.state_mutability == ethers::abi::StateMutability::Payable).count();
	score += (payable_count as u32) * 5;

	if abi.fallback {
		score += 10;
	}
	if abi.receive {
		score += 10;
	}

	score.min(100) as u8
}

#[cfg(test)]
mod tests {
	use super::*;
	use ethers::abi::{Function, Param, ParamType, StateMutability};

	fn empty_abi() -> Abi {
		Abi::default()
	}

	fn payable_function(name: &str) -> Function {
		#[allow(deprecated)]
		Function {
			name: name.to_string(),
			inputs: vec![Param { name: "x".to_string(), kind: ParamType::Uint(256), internal_type: None }],
			outputs: vec![],
			constant: None,
			state_mutability: StateMutability::Payable,
		}
	}

	#[test]
	fn empty_contract_scores_zero() {
		assert_eq!(risk_score(&[], &empty_abi()), 0);
	}

	#[test]
	fn large_bytecode_dominates_the_score() {
		let big = vec![0u8; 25_000];
		assert!(risk_score(&big, &empty_abi()) >= 30);
	}

	#[test]
	fn payable_functions_scale_linearly_but_the_total_is_capped() {
		let mut abi = empty_abi();
		for i in 0..10 {
			let f = payable_function(&format!("pay{i}"));
			abi.functions.entry(f.name.clone()).or_default().push(f);
		}
		assert_eq!(risk_score(&[0u8; 30_000], &abi), 100);
	}

	#[test]
	fn fallback_and_receive_each_add_ten() {
		let mut abi = empty_abi();
		abi.fallback = true;
		abi.receive = true;
		assert_eq!(risk_score(&[], &abi), 20);
	}
}
