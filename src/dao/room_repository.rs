use serde::de::DeserializeOwned;
use tracing::warn;

use crate::{
    dao::{
        document::{DocPath, Millis, WriteBatch, decode},
        document_store::StoreHandle,
        models::{
            BangerVoteEntity, PlayerEntity, RoomEntity, RoundStateEntity, SongMetaEntity,
            SubmissionEntity, VoteEntity,
        },
        paths,
        storage::StorageResult,
    },
    state::{
        ledger::{BangerVote, RoundLedger, SongMeta, Submission, Vote},
        room::{Player, Room, RoomSnapshot, sort_by_join_order},
    },
};

/// Typed reads and commits for one room.
#[derive(Clone)]
pub struct RoomRepository {
    store: StoreHandle,
    code: String,
}

impl RoomRepository {
    /// Repository for room `code` over `store`.
    pub fn new(store: StoreHandle, code: impl Into<String>) -> Self {
        Self {
            store,
            code: code.into(),
        }
    }

    /// Normalized room code.
    pub fn code(&self) -> &str {
        &self.code
    }

    async fn read<T: DeserializeOwned>(&self, path: &DocPath) -> StorageResult<Option<T>> {
        match self.store.get(path).await? {
            Some(document) => decode(path, document).map(Some),
            None => Ok(None),
        }
    }

    async fn read_children<T: DeserializeOwned>(
        &self,
        collection: &DocPath,
    ) -> StorageResult<Vec<(String, T)>> {
        let mut decoded = Vec::new();
        for (id, document) in self.store.list(collection).await? {
            let path = collection.child(&id)?;
            decoded.push((id, decode(&path, document)?));
        }
        Ok(decoded)
    }

    /// Room document; `None` when the room does not exist.
    pub async fn room(&self) -> StorageResult<Option<Room>> {
        let entity = self.read::<RoomEntity>(&paths::room(&self.code)?).await?;
        Ok(entity.map(|entity| Room::from((self.code.clone(), entity))))
    }

    /// Every player of the room in join order.
    pub async fn players(&self) -> StorageResult<Vec<Player>> {
        let mut players: Vec<Player> = self
            .read_children::<PlayerEntity>(&paths::players(&self.code)?)
            .await?
            .into_iter()
            .map(|(_, entity)| Player::from(entity))
            .collect();
        sort_by_join_order(&mut players);
        Ok(players)
    }

    /// Everything recorded for `round_number`; round 0 has an empty ledger.
    pub async fn round_ledger(&self, round_number: u32) -> StorageResult<RoundLedger> {
        let mut ledger = RoundLedger::empty(round_number);
        if round_number == 0 {
            return Ok(ledger);
        }

        ledger.collect_started_at = self
            .read::<RoundStateEntity>(&paths::round_state(&self.code, round_number)?)
            .await?
            .and_then(|state| state.collect_started_at);

        for (player_id, entity) in self
            .read_children::<SubmissionEntity>(&paths::submissions(&self.code, round_number)?)
            .await?
        {
            ledger
                .submissions
                .insert(player_id.clone(), Submission::from((player_id, entity)));
        }

        for (raw_index, entity) in self
            .read_children::<SongMetaEntity>(&paths::songs(&self.code, round_number)?)
            .await?
        {
            let Ok(index) = raw_index.parse::<usize>() else {
                warn!(room = %self.code, round = round_number, id = %raw_index, "ignoring song with non-numeric index");
                continue;
            };
            ledger.songs.insert(index, SongMeta::from((index, entity)));

            let votes = self
                .read_children::<VoteEntity>(&paths::votes(&self.code, round_number, index)?)
                .await?
                .into_iter()
                .map(|(voter_id, entity)| (voter_id.clone(), Vote::from((voter_id, entity))))
                .collect();
            ledger.votes.insert(index, votes);
        }

        for (player_id, entity) in self
            .read_children::<BangerVoteEntity>(&paths::banger_votes(&self.code, round_number)?)
            .await?
        {
            ledger
                .banger_votes
                .insert(player_id.clone(), BangerVote::from((player_id, entity)));
        }

        Ok(ledger)
    }

    /// Ledgers of rounds `1..=through`, oldest first.
    pub async fn round_ledgers(&self, through: u32) -> StorageResult<Vec<RoundLedger>> {
        let mut ledgers = Vec::with_capacity(through as usize);
        for round_number in 1..=through {
            ledgers.push(self.round_ledger(round_number).await?);
        }
        Ok(ledgers)
    }

    /// Room, roster and current-round ledger read together; `None` when the room is gone.
    pub async fn snapshot(&self) -> StorageResult<Option<RoomSnapshot>> {
        let Some(room) = self.room().await? else {
            return Ok(None);
        };
        let players = self.players().await?;
        let ledger = self.round_ledger(room.round_number).await?;
        Ok(Some(RoomSnapshot {
            room,
            players,
            ledger,
        }))
    }

    /// Commit `batch` atomically and return its commit time.
    pub async fn commit(&self, batch: WriteBatch) -> StorageResult<Millis> {
        self.store.commit(batch).await
    }
}
