use deblur_core::solver::SolverConfig;

#[test]
fn defaults_match_the_documented_surface() {
    let config = SolverConfig::default();
    assert_eq!(config.num_iters, 500);
    assert_eq!(config.lr_x, 1e-2);
    assert_eq!(config.lr_k, 1e-2);
    assert_eq!(config.lambda_x, 0.0);
    assert_eq!(config.lambda_k_l2, 1e-3);
    assert_eq!(config.lambda_k_center, 1e-3);
    assert_eq!(config.lambda_k_auto, 0.0);
    assert_eq!(config.lambda_pink, 0.0);
    assert_eq!(config.lambda_diffusion, 0.0);
    assert_eq!(config.kernel_size, 15);
    assert_eq!(config.pink_alpha, 1.0);
    assert_eq!(config.diffusion_t_index, 200);
    assert_eq!(config.log_every, 10);
}

#[test]
fn config_serde_roundtrip() {
    let config = SolverConfig {
        num_iters: 250,
        lr_x: 5e-3,
        lambda_k_auto: 1e-4,
        kernel_size: 21,
        ..SolverConfig::default()
    };
    let json = serde_json::to_string(&config).unwrap();
    let restored: SolverConfig = serde_json::from_str(&json).unwrap();
    assert_eq!(format!("{:?}", config), format!("{:?}", restored));
}

#[test]
fn partial_config_fills_in_defaults() {
    let restored: SolverConfig = serde_json::from_str(r#"{"num_iters": 42}"#).unwrap();
    assert_eq!(restored.num_iters, 42);
    assert_eq!(restored.kernel_size, 15);
    assert_eq!(restored.lambda_k_l2, 1e-3);
}
