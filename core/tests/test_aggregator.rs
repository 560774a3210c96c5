// Aggregator rotation, listener dispatch on every context, flush policies.

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use crossbeam::channel::{bounded, unbounded, Receiver};
    use kinesis_agg_core::{
        aggregator::{Aggregator, AggregatorConfig, AggregatorState, CompletionListener, DispatchContext, DispatchPool, FlushPolicy},
        record::{AggregationError, Container, UserRecord},
    };

    const WAIT: Duration = Duration::from_secs(5);

    fn init_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    }

    fn small(policy: FlushPolicy) -> Aggregator {
        let config = AggregatorConfig::default()
            .with_max_container_bytes(256)
            .with_flush_policy(policy)
            .with_dispatch_workers(2);
        Aggregator::with_config(config).unwrap()
    }

    fn channel_listener() -> (Arc<dyn CompletionListener>, Receiver<Arc<Container>>) {
        let (tx, rx) = unbounded();
        let listener: Arc<dyn CompletionListener> = Arc::new(move |c: Arc<Container>| {
            tx.send(c).unwrap();
        });
        (listener, rx)
    }

    /// Add 40-byte records until the first rotation, returning the completed container.
    fn fill_until_rotation(agg: &mut Aggregator) -> Arc<Container> {
        for i in 0..100 {
            if let Some(done) = agg.add_user_record("pk", Some("1"), vec![i as u8; 40]).unwrap() {
                return done;
            }
        }
        panic!("no rotation within 100 records");
    }

    #[test]
    fn listener_on_each_context_sees_the_rotated_container() {
        init_tracing();
        let pool = DispatchPool::new(1).unwrap();
        let contexts = vec![
            DispatchContext::Shared,
            DispatchContext::Inline,
            DispatchContext::Thread,
            DispatchContext::Pool(pool),
        ];

        for ctx in contexts {
            let mut agg = small(FlushPolicy::Immediate);
            let (listener, rx) = channel_listener();
            assert!(agg.on_complete_with(listener, ctx.clone()));

            let done = fill_until_rotation(&mut agg);
            let seen = rx.recv_timeout(WAIT).unwrap_or_else(|_| panic!("no dispatch on {:?}", ctx));
            assert!(Arc::ptr_eq(&done, &seen));
            assert!(rx.try_recv().is_err());
        }
    }

    #[test]
    fn inline_listener_runs_before_add_returns() {
        let mut agg = small(FlushPolicy::Immediate);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        agg.on_complete_with(
            Arc::new(move |c: Arc<Container>| sink.lock().unwrap().push(c.num_records())),
            DispatchContext::Inline,
        );

        let done = fill_until_rotation(&mut agg);
        assert_eq!(*seen.lock().unwrap(), vec![done.num_records()]);
        assert_eq!(agg.counters().listener_dispatches, 1);
    }

    #[test]
    fn every_listener_gets_every_rotation() {
        let mut agg = small(FlushPolicy::Immediate);
        let (a, rx_a) = channel_listener();
        let (b, rx_b) = channel_listener();
        agg.on_complete(a);
        agg.on_complete_with(b, DispatchContext::Thread);

        let first = fill_until_rotation(&mut agg);
        let second = fill_until_rotation(&mut agg);

        let mut got_a = vec![rx_a.recv_timeout(WAIT).unwrap(), rx_a.recv_timeout(WAIT).unwrap()];
        let mut got_b = vec![rx_b.recv_timeout(WAIT).unwrap(), rx_b.recv_timeout(WAIT).unwrap()];
        // pool and thread contexts give no ordering guarantee between rotations
        for got in [&mut got_a, &mut got_b] {
            got.sort_by_key(|c| Arc::as_ptr(c) as usize);
            let mut want = vec![Arc::clone(&first), Arc::clone(&second)];
            want.sort_by_key(|c| Arc::as_ptr(c) as usize);
            assert!(got.iter().zip(&want).all(|(g, w)| Arc::ptr_eq(g, w)));
        }
    }

    #[test]
    fn panicking_listener_does_not_break_dispatch() {
        init_tracing();
        let pool = DispatchPool::new(1).unwrap();
        let mut agg = small(FlushPolicy::Immediate);
        agg.on_complete_with(Arc::new(|_c: Arc<Container>| { panic!("listener failure"); }), DispatchContext::Pool(pool.clone()));
        agg.on_complete_with(Arc::new(|_c: Arc<Container>| { panic!("inline failure"); }), DispatchContext::Inline);
        let (listener, rx) = channel_listener();
        agg.on_complete_with(listener, DispatchContext::Pool(pool));

        fill_until_rotation(&mut agg);
        fill_until_rotation(&mut agg);
        assert!(rx.recv_timeout(WAIT).is_ok());
        assert!(rx.recv_timeout(WAIT).is_ok());
    }

    #[test]
    fn clear_and_get_does_not_notify() {
        let mut agg = small(FlushPolicy::Immediate);
        let (listener, rx) = channel_listener();
        agg.on_complete_with(listener, DispatchContext::Inline);

        agg.add_user_record("k", None, &b"v"[..]).unwrap();
        let flushed = agg.clear_and_get().unwrap();
        assert_eq!(flushed.num_records(), 1);
        assert!(rx.try_recv().is_err());
        assert_eq!(agg.state(), AggregatorState::Empty);
        assert_eq!(agg.counters().containers_flushed, 1);
    }

    #[test]
    fn accumulate_policy_retains_until_drain() {
        let mut agg = small(FlushPolicy::Accumulate);
        let mut rotated = 0;
        for i in 0..30u8 {
            if agg.add_user_record("pk", Some("1"), vec![i; 40]).unwrap().is_some() {
                rotated += 1;
            }
        }
        assert!(rotated >= 2);
        assert_eq!(agg.num_containers(), rotated + 1);

        let drained = agg.drain();
        assert_eq!(drained.len(), rotated + 1);
        assert_eq!(drained.iter().map(|c| c.num_records()).sum::<usize>(), 30);
        assert!(drained.iter().all(|c| c.size_bytes() <= 256));

        assert_eq!(agg.num_containers(), 0);
        assert!(agg.drain().is_empty());
    }

    #[test]
    fn immediate_policy_drains_only_current() {
        let mut agg = small(FlushPolicy::Immediate);
        fill_until_rotation(&mut agg);
        assert_eq!(agg.num_containers(), 1);
        assert_eq!(agg.drain().len(), 1);
    }

    #[test]
    fn add_all_feeds_sink_in_order() {
        let mut agg = small(FlushPolicy::Immediate);
        let records = (0..25u8).map(|i| UserRecord::new(format!("pk-{}", i % 3), vec![i; 40]));

        let mut sunk = Vec::new();
        let added = agg.add_all(records, |c| sunk.push(c)).unwrap();
        assert_eq!(added, 25);
        assert!(!sunk.is_empty());

        let mut firsts: Vec<u8> = sunk
            .iter()
            .map(|c| c.user_records().next().unwrap().data()[0])
            .collect();
        let sorted = {
            let mut s = firsts.clone();
            s.sort_unstable();
            s
        };
        assert_eq!(firsts, sorted);
        firsts.dedup();
        assert_eq!(firsts.len(), sunk.len());

        let total: usize = sunk.iter().map(|c| c.num_records()).sum::<usize>() + agg.num_user_records();
        assert_eq!(total, 25);
    }

    #[test]
    fn add_all_stops_at_first_error() {
        let mut agg = small(FlushPolicy::Immediate);
        let records = vec![
            UserRecord::new("a", &b"1"[..]),
            UserRecord::new("", &b"2"[..]),
            UserRecord::new("c", &b"3"[..]),
        ];
        let err = agg.add_all(records, |_| {}).unwrap_err();
        assert!(matches!(err, AggregationError::Validation(_)));
        assert_eq!(agg.num_user_records(), 1);
    }

    #[test]
    fn too_large_for_cap_never_rotates() {
        let mut agg = small(FlushPolicy::Immediate);
        agg.add_user_record("k", None, &b"v"[..]).unwrap();
        let err = agg.add_user_record("k", None, vec![0u8; 300]).unwrap_err();
        assert!(matches!(err, AggregationError::CapacityExceeded { max: 256, .. }));
        assert_eq!(agg.num_user_records(), 1);
        assert_eq!(agg.counters().containers_rotated, 0);
    }

    #[test]
    fn rotation_does_not_wait_for_a_blocked_listener() {
        let contexts = vec![DispatchContext::Shared, DispatchContext::Pool(DispatchPool::new(1).unwrap())];

        for ctx in contexts {
            let mut agg = small(FlushPolicy::Immediate);
            let (entered_tx, entered_rx) = unbounded();
            let (release_tx, release_rx) = bounded::<()>(0);
            agg.on_complete_with(
                Arc::new(move |c: Arc<Container>| {
                    entered_tx.send(c.num_records()).unwrap();
                    let _ = release_rx.recv_timeout(WAIT);
                }),
                ctx.clone(),
            );

            fill_until_rotation(&mut agg);
            entered_rx.recv_timeout(WAIT).unwrap_or_else(|_| panic!("listener never ran on {:?}", ctx));

            // listener is parked; adds and a further rotation must still go through
            assert!(agg.add_user_record("pk", Some("1"), &b"more"[..]).is_ok());
            fill_until_rotation(&mut agg);
            assert_eq!(agg.counters().containers_rotated, 2);

            release_tx.send(()).unwrap();
            entered_rx.recv_timeout(WAIT).unwrap();
            release_tx.send(()).unwrap();
        }
    }
}
