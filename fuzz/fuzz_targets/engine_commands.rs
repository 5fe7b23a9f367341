#![no_main]

use libfuzzer_sys::fuzz_target;
use randplay::core::PlayerCore;
use randplay::model::{Item, ItemSource, ListKind, Settings};
use randplay::playlist::DrawSeed;
use std::path::PathBuf;

fuzz_target!(|data: &[u8]| {
    let Some((&head, commands)) = data.split_first() else {
        return;
    };
    let pool_len = usize::from(head % 24) + 1;
    let settings = Settings {
        no_repeat_window: Some(usize::from(head >> 3)),
        look_ahead_after: 4,
        ..Settings::default()
    };
    let mut core = PlayerCore::with_seed(settings, DrawSeed::new(u64::from(head)));
    core.load_pool(
        (0..pool_len)
            .map(|n| {
                Item::new(ItemSource::File(PathBuf::from(format!("track_{n}.mp3"))))
                    .with_field("title", format!("track {n}"))
            })
            .collect(),
    );

    for pair in commands.chunks(2) {
        let arg = usize::from(pair.get(1).copied().unwrap_or_default());
        match pair[0] % 10 {
            0 => {
                let _ = core.play_next();
            }
            1 => {
                let _ = core.play_prev();
            }
            2 => {
                let _ = core.play_from(ListKind::Browse, arg % pool_len);
            }
            3 => {
                let _ = core.resume_playlist();
            }
            4 => {
                let _ = core.remove_upcoming(arg % 6);
            }
            5 => {
                let _ = core.insert_upcoming(arg % 6, arg % pool_len);
            }
            6 => core.reshuffle(),
            7 => {
                let _ = core.set_no_repeat_window(Some(arg % pool_len));
            }
            8 => core.set_query(&format!("track {}", arg % 4)),
            _ => core.set_restrict_to_query(arg % 2 == 0),
        }

        let entries = core.playlist().entries();
        let start = entries.len().saturating_sub(core.window());
        let banned: std::collections::BTreeSet<usize> = entries[start..].iter().copied().collect();
        assert_eq!(core.eligible().len(), pool_len - banned.len());
        assert!(core.eligible().iter().all(|index| !banned.contains(&index)));
    }
});
