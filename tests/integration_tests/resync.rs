// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! AKA resynchronisation: the BSF's challenge carries an AUTN the UE does
//! not recognise, the UE reports AUTS, the HSS re-sequences.

use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use gba_fabric::{
    client::application::MeRequest,
    hss::server::{MemoryDb, SubscriberDb},
    models::av::Av,
};

use crate::integration_tests::common::{fixed_av, me_client, start_fabric};

const IMPI: &str = "alice@mnc99.mcc999.pub.3gppnetwork.org";

/// HSS store that is out of step with the UE until the UE reports AUTS.
struct OutOfStepDb {
    stale: Av,
    resequenced: Av,
    resynced: AtomicBool,
}

impl SubscriberDb for OutOfStepDb {
    async fn lookup(&self, impi: &str) -> Option<Av> {
        if impi != self.stale.impi {
            return None;
        }
        if self.resynced.load(Ordering::SeqCst) {
            Some(self.resequenced.clone())
        } else {
            Some(self.stale.clone())
        }
    }

    async fn resync(&self, impi: &str, rand: [u8; 16], _auts: [u8; 14]) -> Option<Av> {
        // The reported RAND names the challenge the UE rejected.
        assert_eq!(rand, self.stale.rand);
        self.resynced.store(true, Ordering::SeqCst);
        if impi == self.resequenced.impi {
            Some(self.resequenced.clone())
        } else {
            None
        }
    }
}

#[tokio::test]
async fn test_auts_resync_recovers_the_bootstrap() {
    // The UE's current vector.
    let ue_av = fixed_av(IMPI);

    // The HSS's stale view differs in RAND and AUTN.
    let mut stale = ue_av.clone();
    stale.rand = [0x77; 16];
    stale.autn = [0x88; 16];

    let hss_db = Arc::new(OutOfStepDb {
        stale,
        resequenced: ue_av.clone(),
        resynced: AtomicBool::new(false),
    });
    let me_db = Arc::new(MemoryDb::new());
    me_db.insert(ue_av);

    let fabric = start_fabric(hss_db.clone(), Duration::from_secs(60))
        .await
        .expect("failed to start fabric");
    let me = me_client(&fabric, me_db);

    let ans = me
        .request(MeRequest {
            method: "GET".to_string(),
            url: fabric.naf_url.clone(),
            impi: IMPI.to_string(),
            ..MeRequest::default()
        })
        .await
        .expect("NAF request failed");

    assert_eq!(ans.code, 200);
    assert!(
        hss_db.resynced.load(Ordering::SeqCst),
        "the HSS must have seen the AUTS report"
    );
}
