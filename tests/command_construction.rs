//! Property tests for miner command construction

use mining_supervisor::backend::Invocation;
use mining_supervisor::{
    HardwareKind, HardwareUnit, MinerBackend, MinerKind, PoolEndpoint, RewardTarget,
};
use proptest::prelude::*;

fn hardware_kind() -> impl Strategy<Value = HardwareKind> {
    prop_oneof![
        Just(HardwareKind::Cuda),
        Just(HardwareKind::OpenCl),
        Just(HardwareKind::Cpu),
    ]
}

fn any_hardware() -> impl Strategy<Value = Vec<HardwareUnit>> {
    prop::collection::vec(
        (0u32..16, 0u32..4, hardware_kind())
            .prop_map(|(index, platform, kind)| HardwareUnit::new(index, platform, kind)),
        0..6,
    )
}

fn any_algorithm() -> impl Strategy<Value = &'static str> {
    prop::sample::select(vec!["rx/0", "cn/r", "kawpow", "ethash", "argon2/chukwa"])
}

fn any_reward() -> impl Strategy<Value = RewardTarget> {
    ("[A-Z]{2,5}", "[0-9A-Z]{8,40}").prop_map(|(coin, address)| RewardTarget::new(coin, address))
}

fn build(
    kind: MinerKind,
    hardware: &[HardwareUnit],
    algorithm: &str,
    reward: &RewardTarget,
    port: u16,
) -> String {
    let endpoint = PoolEndpoint::new("pool.example.com", port);
    kind.backend().build_invocation(&Invocation {
        hardware,
        algorithm,
        reward,
        endpoint: &endpoint,
    })
}

proptest! {
    #[test]
    fn construction_is_pure(
        hardware in any_hardware(),
        algorithm in any_algorithm(),
        reward in any_reward(),
        port in 1u16..=u16::MAX,
    ) {
        for kind in MinerKind::ALL {
            let first = build(kind, &hardware, algorithm, &reward, port);
            let second = build(kind, &hardware, algorithm, &reward, port);
            prop_assert_eq!(&first, &second);

            let expected_user = format!("-u {}:{}", reward.coin, reward.address);
            let expected_pool = format!("-o stratum+tcp://pool.example.com:{}", port);
            prop_assert!(first.contains(&expected_user));
            prop_assert!(first.contains(&expected_pool));
        }
    }

    #[test]
    fn xmrig_device_families_never_mix(
        hardware in any_hardware(),
        algorithm in any_algorithm(),
        reward in any_reward(),
    ) {
        let command = build(MinerKind::Xmrig, &hardware, algorithm, &reward, 3333);

        match hardware.first().map(|unit| unit.kind) {
            Some(HardwareKind::Cuda) => {
                prop_assert!(command.contains("--cuda-devices="));
                prop_assert!(!command.contains("opencl"));
            }
            Some(HardwareKind::OpenCl) => {
                prop_assert!(command.contains("--opencl-devices="));
                prop_assert!(!command.contains("cuda"));
            }
            Some(HardwareKind::Cpu) | None => {
                prop_assert!(!command.contains("cuda"));
                prop_assert!(!command.contains("opencl"));
                prop_assert!(!command.contains("--no-cpu"));
            }
        }
    }

    #[test]
    fn trex_device_flag_only_with_hardware(
        hardware in any_hardware(),
        algorithm in any_algorithm(),
        reward in any_reward(),
    ) {
        let command = build(MinerKind::TRex, &hardware, algorithm, &reward, 3333);
        prop_assert_eq!(command.contains(" -d "), !hardware.is_empty());

        if !hardware.is_empty() {
            let indices: Vec<String> = hardware.iter().map(|unit| unit.index.to_string()).collect();
            let expected = format!(" -d {}", indices.join(","));
            prop_assert!(command.ends_with(&expected));
        }
    }
}
