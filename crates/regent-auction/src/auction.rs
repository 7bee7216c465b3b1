//! Sale mechanics: price curve, bonus-adjusted purchases, claims.

use crate::error::AuctionError;
use once_cell::sync::Lazy;
use regent_ledger::TokenLedger;
use regent_types::{Address, U256};
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// Length of one sale week in seconds.
pub const WEEK: u64 = 604_800;

/// Bonus divisor: the early-buyer bonus is `payment * time_left / (2 * WEEK)`,
/// i.e. up to 50% at the opening second, zero at week end.
pub const BONUS_WINDOW: u64 = 2 * WEEK;

/// Divisor of the price curve: `price = time_left^8 / 10^28`.
static PRICE_DIVISOR: Lazy<U256> =
    Lazy::new(|| U256::from(10_000_000_000_000_000_000_000_000_000u128));

/// Sale parameters.
#[derive(Debug, Clone)]
pub struct AuctionParams {
    /// Supply released each week, in smallest units.
    pub weekly_tokens: U256,
}

impl Default for AuctionParams {
    fn default() -> Self {
        Self {
            // One million whole tokens per week
            weekly_tokens: U256::from(1_000_000u64) * U256::COIN,
        }
    }
}

/// The weekly declining-price sale.
///
/// Weeks lie on a fixed grid from `start_time`; week `w` spans
/// `[start_time + w*WEEK, start_time + (w+1)*WEEK)`. A week becomes
/// claimable once finalized, either by `next_week` (time elapsed or the
/// falling price catching up with the contributions) or immediately by a
/// purchase that exactly fills the supply cap.
#[derive(Debug)]
pub struct Auction {
    params: AuctionParams,
    /// Ledger account the claimable tokens are paid out of.
    address: Address,
    start_time: u64,
    current_week: u64,
    tokens_per_week: HashMap<u64, U256>,
    week_shares: HashMap<u64, U256>,
    purchases: HashMap<u64, HashMap<Address, U256>>,
    finalized: HashSet<u64>,
    proceeds: U256,
}

impl Auction {
    pub fn new(params: AuctionParams, address: Address, start_time: u64) -> Self {
        let mut tokens_per_week = HashMap::new();
        // Issuance for a week is fixed the moment the week opens
        tokens_per_week.insert(0, params.weekly_tokens);

        Self {
            params,
            address,
            start_time,
            current_week: 0,
            tokens_per_week,
            week_shares: HashMap::new(),
            purchases: HashMap::new(),
            finalized: HashSet::new(),
            proceeds: U256::ZERO,
        }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn current_week(&self) -> u64 {
        self.current_week
    }

    pub fn week_start(&self) -> u64 {
        self.start_time + self.current_week * WEEK
    }

    pub fn week_end(&self) -> u64 {
        self.week_start() + WEEK
    }

    pub fn tokens_per_week(&self, week: u64) -> U256 {
        self.tokens_per_week.get(&week).copied().unwrap_or(U256::ZERO)
    }

    pub fn week_shares(&self, week: u64) -> U256 {
        self.week_shares.get(&week).copied().unwrap_or(U256::ZERO)
    }

    pub fn purchase(&self, week: u64, buyer: &Address) -> U256 {
        self.purchases
            .get(&week)
            .and_then(|m| m.get(buyer))
            .copied()
            .unwrap_or(U256::ZERO)
    }

    pub fn is_finalized(&self, week: u64) -> bool {
        self.finalized.contains(&week)
    }

    /// Native-currency payments collected across all weeks.
    pub fn proceeds(&self) -> U256 {
        self.proceeds
    }

    fn time_left(&self, now: u64) -> u64 {
        self.week_end().saturating_sub(now).min(WEEK)
    }

    /// Price of one whole token at `now`: `time_left^8 / 10^28`.
    pub fn price_at(&self, now: u64) -> U256 {
        let time_left = self.time_left(now) as u128;
        // time_left <= WEEK, so time_left^4 fits u128 and the square of
        // that fits 256 bits; the operators cannot overflow.
        let t4 = U256::from(time_left.pow(4));
        t4 * t4 / *PRICE_DIVISOR
    }

    /// Native-currency value of the active week's full supply at `now`.
    ///
    /// The running bonus-adjusted contribution total may never exceed
    /// this, which is what closes the sale as the price falls.
    fn supply_cap(&self, now: u64) -> Result<U256, AuctionError> {
        self.price_at(now)
            .checked_mul_div(&self.tokens_per_week(self.current_week), &U256::COIN)
            .ok_or(AuctionError::Overflow)
    }

    /// Record a purchase of `payment` native units for `recipient`.
    ///
    /// Returns the bonus-adjusted contribution credited. Fails with
    /// `StaleWeek` unless `week` is the open, unfinalized week, and with
    /// `Oversold` if the contribution would outrun the week's supply at
    /// the current price. An exact fill finalizes the week on the spot.
    pub fn buy(
        &mut self,
        week: u64,
        recipient: Address,
        payment: U256,
        now: u64,
    ) -> Result<U256, AuctionError> {
        if week != self.current_week || self.is_finalized(week) || now < self.week_start() {
            return Err(AuctionError::StaleWeek);
        }

        let bonus = payment
            .checked_mul_div(&U256::from(self.time_left(now)), &U256::from(BONUS_WINDOW))
            .ok_or(AuctionError::Overflow)?;
        let contribution = payment.checked_add(&bonus).ok_or(AuctionError::Overflow)?;

        let cap = self.supply_cap(now)?;
        let total = self
            .week_shares(week)
            .checked_add(&contribution)
            .ok_or(AuctionError::Overflow)?;
        if total > cap {
            return Err(AuctionError::Oversold);
        }

        let entry = self
            .purchases
            .entry(week)
            .or_default()
            .entry(recipient)
            .or_insert(U256::ZERO);
        *entry = entry
            .checked_add(&contribution)
            .ok_or(AuctionError::Overflow)?;
        self.week_shares.insert(week, total);
        self.proceeds = self
            .proceeds
            .checked_add(&payment)
            .ok_or(AuctionError::Overflow)?;

        debug!(week, %recipient, %payment, %contribution, "buy");

        if total == cap {
            debug!(week, "supply cap met exactly, finalizing");
            self.finalized.insert(week);
        }

        Ok(contribution)
    }

    /// Finalize the active week and open the next one.
    ///
    /// Allowed once the week has sold out — by an exact fill, or by the
    /// falling price making the recorded contributions cover the whole
    /// supply — or once the week's end time has passed.
    pub fn next_week(&mut self, now: u64) -> Result<u64, AuctionError> {
        let week = self.current_week;
        let sold_out = self.is_finalized(week)
            || self.week_shares(week) >= self.supply_cap(now)?;

        if !sold_out && now < self.week_end() {
            return Err(AuctionError::NotFullySold);
        }

        self.finalized.insert(week);
        self.current_week = week + 1;
        self.tokens_per_week
            .insert(self.current_week, self.params.weekly_tokens);

        debug!(finalized = week, open = self.current_week, "next week");
        Ok(self.current_week)
    }

    /// Pay out `recipient`'s pro-rata share of a finalized week.
    ///
    /// `tokens_per_week * contribution / week_shares`, floor division;
    /// the buyer's record is zeroed so a repeat claim yields zero rather
    /// than an error.
    pub fn claim_purchase(
        &mut self,
        ledger: &mut TokenLedger,
        week: u64,
        recipient: Address,
    ) -> Result<U256, AuctionError> {
        if !self.is_finalized(week) {
            return Err(AuctionError::NotFinished);
        }

        let contribution = self.purchase(week, &recipient);
        if contribution.is_zero() {
            return Ok(U256::ZERO);
        }

        let payout = self
            .tokens_per_week(week)
            .checked_mul_div(&contribution, &self.week_shares(week))
            .ok_or(AuctionError::Overflow)?;

        if let Some(entries) = self.purchases.get_mut(&week) {
            entries.insert(recipient, U256::ZERO);
        }
        ledger.transfer(self.address, recipient, payout)?;

        debug!(week, %recipient, %payout, "claim");
        Ok(payout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    // Exact curve values: price(t) = (WEEK - t)^8 / 10^28
    const PRICE_T0: u64 = 1_790_169_938_495_916_959;
    const PRICE_12H: u64 = 989_502_265_723_401_594;
    const PRICE_102H: u64 = 1_015_714_121_433_904;

    fn addr(n: u8) -> Address {
        let mut bytes = [0u8; 20];
        bytes[19] = n;
        Address::from_bytes(bytes)
    }

    fn setup() -> (Auction, TokenLedger) {
        let pool = Address::from_label("regent/auction");
        let mut ledger = TokenLedger::new("Regent", "RGT", 1, addr(100));
        let auction = Auction::new(AuctionParams::default(), pool, 0);
        // Fund ten weeks of claims
        ledger
            .mint(pool, U256::from(10_000_000u64) * U256::COIN)
            .unwrap();
        (auction, ledger)
    }

    /// Largest payment that still fits under the cap at 102 hours:
    /// `(56 * cap + 55) / 67` with `cap = price(102h) * 1e6`.
    fn max_payment_102h(auction: &Auction) -> U256 {
        let cap = auction.price_at(102 * 3600) * U256::from(1_000_000u64);
        (U256::from(56u64) * cap + U256::from(55u64)) / U256::from(67u64)
    }

    #[test]
    fn test_opening_price() {
        let (auction, _) = setup();
        let p0 = auction.price_at(0);
        assert_eq!(p0, U256::from(PRICE_T0));
        // ~1.79 per token
        assert_eq!(p0 / U256::from(10u64.pow(15)), U256::from(1790u64));
    }

    #[test]
    fn test_price_under_one_at_12_hours() {
        let (auction, _) = setup();
        let p = auction.price_at(12 * 3600);
        assert_eq!(p, U256::from(PRICE_12H));
        assert_eq!(p / U256::from(10u64.pow(15)), U256::from(989u64));
    }

    #[test]
    fn test_price_at_102_hours() {
        let (auction, _) = setup();
        assert_eq!(auction.price_at(102 * 3600), U256::from(PRICE_102H));
    }

    #[test]
    fn test_price_reaches_zero_at_week_end() {
        let (auction, _) = setup();
        assert_eq!(auction.price_at(WEEK), U256::ZERO);
        assert_eq!(auction.price_at(WEEK + 1), U256::ZERO);
    }

    #[test]
    fn test_price_decreasing_hourly() {
        let (auction, _) = setup();
        let mut last = auction.price_at(0);
        for hour in 1..=167 {
            let price = auction.price_at(hour * 3600);
            assert!(price < last, "price must fall hour over hour");
            last = price;
        }
    }

    #[test]
    fn test_buy_wrong_week_is_stale() {
        let (mut auction, _) = setup();
        assert_eq!(
            auction.buy(1, addr(1), U256::COIN, 3600),
            Err(AuctionError::StaleWeek)
        );
    }

    #[test]
    fn test_buy_max_payment_fills_week() {
        let (mut auction, _) = setup();
        let now = 102 * 3600;
        let max = max_payment_102h(&auction);

        // ~0.848k whole native units buys the entire week
        assert_eq!(max / U256::COIN, U256::from(848u64));

        let shares = auction.buy(0, addr(1), max, now).unwrap();
        assert_eq!(shares, auction.week_shares(0));
        // The fixture lands exactly on the cap, so the week closes at once
        assert!(auction.is_finalized(0));
    }

    #[test]
    fn test_buy_one_past_cutoff_oversold() {
        let (mut auction, _) = setup();
        let now = 102 * 3600;
        let too_much = max_payment_102h(&auction) + U256::ONE;

        assert_eq!(
            auction.buy(0, addr(1), too_much, now),
            Err(AuctionError::Oversold)
        );
        assert_eq!(auction.week_shares(0), U256::ZERO);
    }

    #[test]
    fn test_buy_after_exact_fill_is_stale() {
        let (mut auction, _) = setup();
        let now = 102 * 3600;
        let max = max_payment_102h(&auction);
        auction.buy(0, addr(1), max, now).unwrap();

        assert_eq!(
            auction.buy(0, addr(2), U256::ONE, now + 1),
            Err(AuctionError::StaleWeek)
        );
    }

    #[test]
    fn test_next_week_requires_sale() {
        let (mut auction, _) = setup();
        assert_eq!(auction.next_week(3600), Err(AuctionError::NotFullySold));
    }

    #[test]
    fn test_next_week_rejects_partial_sale() {
        let (mut auction, _) = setup();
        let now = 102 * 3600;
        let half = max_payment_102h(&auction) / U256::from(2u64);
        auction.buy(0, addr(1), half, now).unwrap();

        assert_eq!(auction.next_week(now + 1), Err(AuctionError::NotFullySold));
    }

    #[test]
    fn test_next_week_after_full_sale() {
        let (mut auction, _) = setup();
        let now = 102 * 3600;
        auction.buy(0, addr(1), max_payment_102h(&auction), now).unwrap();

        assert_eq!(auction.next_week(now + 1).unwrap(), 1);
        assert_eq!(auction.current_week(), 1);
        // Next week's issuance registered on open
        assert_eq!(
            auction.tokens_per_week(1),
            U256::from(1_000_000u64) * U256::COIN
        );
    }

    #[test]
    fn test_next_week_when_time_is_up() {
        let (mut auction, _) = setup();
        assert_eq!(auction.next_week(WEEK).unwrap(), 1);
        assert_eq!(auction.current_week(), 1);
    }

    #[test]
    fn test_claim_requires_finalized_week() {
        let (mut auction, mut ledger) = setup();
        auction.buy(0, addr(1), U256::COIN, 102 * 3600).unwrap();

        assert_eq!(
            auction.claim_purchase(&mut ledger, 0, addr(1)),
            Err(AuctionError::NotFinished)
        );
    }

    #[test]
    fn test_sole_buyer_claims_entire_week() {
        let (mut auction, mut ledger) = setup();
        let now = 102 * 3600;
        auction.buy(0, addr(1), max_payment_102h(&auction), now).unwrap();
        auction.next_week(now + 1).unwrap();

        let payout = auction.claim_purchase(&mut ledger, 0, addr(1)).unwrap();
        assert_eq!(payout, U256::from(1_000_000u64) * U256::COIN);
        assert_eq!(ledger.balance_of(&addr(1)), payout);
    }

    #[test]
    fn test_bonus_adjusted_contributions() {
        let (mut auction, _) = setup();
        let one = U256::COIN;

        // 1 token-unit of payment at 5h / 40h / 130h into the week
        let q_early = auction.buy(0, addr(1), one, 5 * 3600).unwrap();
        let q_mid = auction.buy(0, addr(2), one, 40 * 3600).unwrap();
        let q_late = auction.buy(0, addr(3), one, 130 * 3600).unwrap();

        assert_eq!(q_early, U256::from(1_485_119_047_619_047_619u64));
        assert_eq!(q_mid, U256::from(1_380_952_380_952_380_952u64));
        assert_eq!(q_late, U256::from(1_113_095_238_095_238_095u64));
        assert_eq!(auction.week_shares(0), q_early + q_mid + q_late);
    }

    #[test]
    fn test_claims_in_proportion_to_contribution() {
        let (mut auction, mut ledger) = setup();
        let one = U256::COIN;
        let supply = U256::from(1_000_000u64) * U256::COIN;

        let q_early = auction.buy(0, addr(1), one, 5 * 3600).unwrap();
        let q_mid = auction.buy(0, addr(2), one, 40 * 3600).unwrap();
        let q_late = auction.buy(0, addr(3), one, 130 * 3600).unwrap();
        let total = q_early + q_mid + q_late;

        auction.next_week(WEEK).unwrap();

        for (who, q) in [(addr(1), q_early), (addr(2), q_mid), (addr(3), q_late)] {
            let payout = auction.claim_purchase(&mut ledger, 0, who).unwrap();
            assert_eq!(payout, supply * q / total);
            assert_eq!(ledger.balance_of(&who), payout);
        }

        // Floor division dust stays with the pool and is below the
        // claimant count
        let paid = ledger.balance_of(&addr(1))
            + ledger.balance_of(&addr(2))
            + ledger.balance_of(&addr(3));
        let dust = supply - paid;
        assert!(dust < U256::from(3u64));
        assert_eq!(dust, U256::ONE);
    }

    #[test]
    fn test_claim_is_idempotent() {
        let (mut auction, mut ledger) = setup();
        auction.buy(0, addr(1), U256::COIN, 5 * 3600).unwrap();
        auction.next_week(WEEK).unwrap();

        let first = auction.claim_purchase(&mut ledger, 0, addr(1)).unwrap();
        assert!(first > U256::ZERO);

        let second = auction.claim_purchase(&mut ledger, 0, addr(1)).unwrap();
        assert_eq!(second, U256::ZERO);
        assert_eq!(ledger.balance_of(&addr(1)), first);
    }

    #[test]
    fn test_claim_without_purchase_pays_nothing() {
        let (mut auction, mut ledger) = setup();
        auction.buy(0, addr(1), U256::COIN, 5 * 3600).unwrap();
        auction.next_week(WEEK).unwrap();

        assert_eq!(
            auction.claim_purchase(&mut ledger, 0, addr(9)).unwrap(),
            U256::ZERO
        );
    }

    #[test]
    fn test_buy_into_not_yet_started_week() {
        let (mut auction, _) = setup();
        let now = 102 * 3600;
        auction.buy(0, addr(1), max_payment_102h(&auction), now).unwrap();
        auction.next_week(now + 1).unwrap();

        // Week 1's window starts at WEEK on the fixed grid; it is not
        // open for purchase yet
        assert_eq!(
            auction.buy(1, addr(2), U256::COIN, now + 2),
            Err(AuctionError::StaleWeek)
        );

        // Once the grid catches up the sale is live
        assert!(auction.buy(1, addr(2), U256::COIN, WEEK + 3600).is_ok());
    }

    #[test]
    fn test_proceeds_accumulate() {
        let (mut auction, _) = setup();
        auction.buy(0, addr(1), U256::COIN, 5 * 3600).unwrap();
        auction.buy(0, addr(2), U256::COIN, 6 * 3600).unwrap();
        assert_eq!(auction.proceeds(), U256::from(2u64) * U256::COIN);
    }

    proptest! {
        #[test]
        fn prop_price_never_increases(a in 0u64..=WEEK, b in 0u64..=WEEK) {
            let (auction, _) = setup();
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            prop_assert!(auction.price_at(lo) >= auction.price_at(hi));
        }

        #[test]
        fn prop_claims_never_exceed_supply(
            payments in proptest::collection::vec(1u64..=1_000_000_000_000u64, 1..6),
            hours in proptest::collection::vec(0u64..160, 1..6),
        ) {
            let (mut auction, mut ledger) = setup();
            let supply = U256::from(1_000_000u64) * U256::COIN;

            let mut buyers = Vec::new();
            for (i, (p, h)) in payments.iter().zip(hours.iter()).enumerate() {
                let who = addr(i as u8 + 1);
                if auction.buy(0, who, U256::from(*p), h * 3600).is_ok() {
                    buyers.push(who);
                }
            }
            prop_assume!(!buyers.is_empty());
            auction.next_week(WEEK).unwrap();

            let mut paid = U256::ZERO;
            for who in &buyers {
                paid += auction.claim_purchase(&mut ledger, 0, *who).unwrap();
            }
            prop_assert!(paid <= supply);
            prop_assert!(supply - paid < U256::from(buyers.len() as u64));
        }
    }
}
