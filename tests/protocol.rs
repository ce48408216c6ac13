use yao_gc::{
    GarblingConfig,
    channel::SimpleChannel,
    ot::TrustedDealer,
    protocol::{Error, evaluator, garbler, simulate_yao},
};

mod common;

use common::{all_configs, load, to_bits};

#[test]
fn eval_xor_circuits_2pc() -> Result<(), Error> {
    let circuit = load("xor3.txt");
    for x in [true, false] {
        for y in [true, false] {
            for z in [true, false] {
                let output = simulate_yao(&circuit, GarblingConfig::default(), &[x, z], &[y])?;
                assert_eq!(output, vec![x ^ y ^ z]);
            }
        }
    }
    Ok(())
}

#[test]
fn eval_adder_2pc() -> Result<(), Error> {
    let circuit = load("adder_4bit.txt");
    for config in all_configs() {
        for (a, b) in [(0, 0), (3, 5), (15, 1), (9, 9), (15, 15)] {
            let output = simulate_yao(&circuit, config, &to_bits(a, 4), &to_bits(b, 4))?;
            assert_eq!(output, to_bits(a + b, 5), "{config:?}");
        }
    }
    Ok(())
}

#[test]
fn eval_millionaires_2pc() -> Result<(), Error> {
    let circuit = load("greater_than_4bit.txt");
    for a in 0..16 {
        for b in [0, 7, a, 15] {
            let output = simulate_yao(
                &circuit,
                GarblingConfig::no_fixed_key_four_to_two(),
                &to_bits(a, 4),
                &to_bits(b, 4),
            )?;
            assert_eq!(output, vec![a > b]);
        }
    }
    Ok(())
}

#[tokio::test]
async fn both_parties_learn_the_output() -> Result<(), Error> {
    let circuit = load("greater_than_4bit.txt");
    let config = GarblingConfig::fixed_key_free_xor_row_reduction();
    let (garbler_channel, evaluator_channel) = SimpleChannel::pair();
    let (garbler_ot, evaluator_ot, dealer) = TrustedDealer::spawn();
    let garbler_circuit = circuit.clone();
    let garbler_task = tokio::spawn(async move {
        garbler(
            &garbler_circuit,
            config,
            &to_bits(12, 4),
            garbler_channel,
            garbler_ot,
        )
        .await
    });
    let evaluated = evaluator(&circuit, &to_bits(10, 4), evaluator_channel, evaluator_ot).await?;
    let garbled = garbler_task.await.expect("garbler task panicked")?;
    dealer.await.expect("dealer task panicked").expect("dealer failed");
    assert_eq!(vec![true], evaluated);
    assert_eq!(evaluated, garbled);
    Ok(())
}

#[test]
fn wrong_input_sizes() {
    let circuit = load("and.txt");
    let result = simulate_yao(&circuit, GarblingConfig::default(), &[true], &[true, false]);
    assert!(matches!(result, Err(Error::CircuitError(_))));
}
