// Property tests for the laws the protocol leans on.

use proptest::prelude::*;
use skiff_crypto::{Envelope, KeyExchange};
use skiff_files::chunker::ChunkWriter;
use skiff_files::{CHUNK_SIZE, resume};
use skiff_wire::message::{self, Message, MessageKind};

proptest! {
    // Matching phrases always agree on a key; the sealed channel built
    // from it round-trips arbitrary payloads.
    #[test]
    fn prop_exchange_key_agreement(phrase in "[a-z]{1,12}-[a-z]{1,12}-[a-z]{1,12}") {
        let (mut initiator, flow1) = KeyExchange::initiator(phrase.as_bytes());
        let mut responder = KeyExchange::responder(phrase.as_bytes());

        let flow2 = responder.update(&flow1).unwrap().unwrap();
        let flow3 = initiator.update(&flow2).unwrap().unwrap();
        responder.update(&flow3).unwrap();

        prop_assert_eq!(
            initiator.session_key().unwrap(),
            responder.session_key().unwrap()
        );
    }

    // Distinct phrases never complete the exchange.
    #[test]
    fn prop_exchange_rejects_mismatch(
        a in "[a-z]{4,12}",
        b in "[a-z]{4,12}",
    ) {
        prop_assume!(a != b);
        let (mut initiator, flow1) = KeyExchange::initiator(a.as_bytes());
        let mut responder = KeyExchange::responder(b.as_bytes());

        let flow2 = responder.update(&flow1).unwrap().unwrap();
        prop_assert!(initiator.update(&flow2).is_err());
    }

    // decode(encode(m)) == m for every message shape.
    #[test]
    fn prop_message_roundtrip(
        kind_idx in 0usize..11,
        text in proptest::option::of(".{0,64}"),
        bytes in proptest::option::of(proptest::collection::vec(any::<u8>(), 0..4096)),
        num in proptest::option::of(any::<u64>()),
    ) {
        const KINDS: [MessageKind; 11] = [
            MessageKind::Pake,
            MessageKind::FileInfo,
            MessageKind::RecipientReady,
            MessageKind::Offer,
            MessageKind::Answer,
            MessageKind::Chunk,
            MessageKind::Ok,
            MessageKind::CloseSender,
            MessageKind::CloseRecipient,
            MessageKind::Finished,
            MessageKind::Error,
        ];
        let envelope = Envelope::new(b"prop key", b"propsalt").unwrap();
        let msg = Message { kind: KINDS[kind_idx], text, bytes, num };

        let sealed = message::encode(&envelope, &msg).unwrap();
        prop_assert_eq!(message::decode(&envelope, &sealed).unwrap(), msg);
    }

    // The resume scan names exactly the chunks that were never written,
    // as long as written chunks carry at least one nonzero byte.
    #[test]
    fn prop_resume_names_unwritten_chunks(
        chunk_count in 1usize..6,
        written in proptest::collection::btree_set(0usize..6, 0..6),
        tail in 1usize..CHUNK_SIZE,
    ) {
        let written: Vec<usize> =
            written.into_iter().filter(|&i| i < chunk_count).collect();
        let total = ((chunk_count - 1) * CHUNK_SIZE + tail) as u64;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("partial.bin");
        let mut writer = ChunkWriter::open(&path, total).unwrap();
        for &index in &written {
            let offset = (index * CHUNK_SIZE) as u64;
            let len = (total - offset).min(CHUNK_SIZE as u64) as usize;
            writer.write_at(offset, &vec![0xA5u8; len]).unwrap();
        }
        writer.sync().unwrap();

        let missing = resume::missing_chunks(&path, total).unwrap();
        let expected: Vec<u64> = (0..chunk_count)
            .filter(|i| !written.contains(i))
            .map(|i| (i * CHUNK_SIZE) as u64)
            .collect();
        prop_assert_eq!(missing, expected);
    }

    // Envelopes built from the same secret and salt interoperate; a salt
    // flip breaks them.
    #[test]
    fn prop_envelope_interop(payload in proptest::collection::vec(any::<u8>(), 0..2048)) {
        let a = Envelope::new(b"shared", b"saltsalt").unwrap();
        let b = Envelope::new(b"shared", b"saltsalt").unwrap();
        let sealed = a.encrypt(&payload).unwrap();
        prop_assert_eq!(b.decrypt(&sealed).unwrap(), payload);
    }
}
