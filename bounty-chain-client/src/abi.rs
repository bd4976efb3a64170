//! Contract ABIs, loaded once per process the same way the witnesser loads
//! `abis/ERC20.json`: `ethabi::Contract::load(include_bytes!(...))`.

use std::sync::OnceLock;

use ethers::abi::Abi;

macro_rules! abi_loader {
	($fn_name:ident, $file:literal) => {
		pub fn $fn_name() -> &'static Abi {
			static ABI: OnceLock<Abi> = OnceLock::new();
			ABI.get_or_init(|| {
				serde_json::from_slice(include_bytes!($file)).expect(concat!("malformed ABI: ", $file))
			})
		}
	};
}

abi_loader!(protocol_registry, "abi/protocol_registry.json");
abi_loader!(bounty_pool, "abi/bounty_pool.json");
abi_loader!(validation_registry, "abi/validation_registry.json");
abi_loader!(agent_identity, "abi/agent_identity.json");
abi_loader!(escrow, "abi/escrow.json");
abi_loader!(erc20, "abi/erc20.json");
