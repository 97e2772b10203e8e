use super::*;

#[test]
fn test_self_comm() {
    let comm = SelfComm;
    assert_eq!(comm.rank(), 0);
    assert_eq!(comm.size(), 1);
    assert_eq!(all_gather(&comm, 5_u32).unwrap(), vec![5]);
    assert_eq!(broadcast(&comm, 0, Some("x")).unwrap(), "x");
    assert!(matches!(
        broadcast::<u8>(&comm, 1, None),
        Err(CommError::BadRoot { root: 1, size: 1 })
    ));
}

#[test]
fn test_all_to_all_threads() {
    let results = run_spmd(3, |comm| {
        let rank = comm.rank();
        // Worker i sends (i, j) to worker j.
        let outgoing = (0..comm.size()).map(|j| (rank, j)).collect();
        all_to_all(&*comm, outgoing).unwrap()
    });
    for (rank, received) in results.into_iter().enumerate() {
        assert_eq!(received, vec![(0, rank), (1, rank), (2, rank)]);
    }
}

#[test]
fn test_broadcast_and_barrier() {
    let results = run_spmd(4, |comm| {
        let value = if comm.rank() == 2 {
            Some(vec![1.0, 2.0])
        } else {
            None
        };
        let got = broadcast(&*comm, 2, value).unwrap();
        barrier(&*comm).unwrap();
        got
    });
    assert!(results.iter().all(|v| v == &[1.0, 2.0]));
}

#[test]
fn test_wrong_payload_count() {
    let results = run_spmd(2, |comm| comm.exchange(vec![]).map(|_| ()));
    for r in results {
        assert_eq!(
            r,
            Err(CommError::WrongPayloadCount {
                expected: 2,
                actual: 0
            })
        );
    }
}

#[test]
fn test_departed_worker_is_reported() {
    let results = run_spmd(2, |comm| {
        if comm.rank() == 1 {
            // Leave without taking part.
            drop(comm);
            return Ok(());
        }
        barrier(&*comm)
    });
    assert_eq!(results[1], Ok(()));
    assert!(matches!(results[0], Err(CommError::Disconnected { .. })));
}

#[test]
fn test_unexpected_payload() {
    let comm = SelfComm;
    let incoming = comm.exchange(vec![Box::new(1_u8) as Payload]).unwrap();
    assert!(incoming[0].downcast_ref::<u8>().is_some());
    let r = all_to_all::<u8>(&comm, vec![3]).unwrap();
    assert_eq!(r, vec![3]);
}
